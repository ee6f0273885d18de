//! Catalog parsing, rendering and discovery

use proptest::prelude::*;
use tempfile::TempDir;

use mirrorwatch::catalog::{find_catalog, Directory, UrlLocator};
use mirrorwatch::config::CatalogConfig;
use mirrorwatch::mirror::{MirrorId, MirrorRange, MirrorTemplate};

fn locator() -> UrlLocator {
    UrlLocator::new(&MirrorTemplate::default()).unwrap()
}

fn range() -> MirrorRange {
    MirrorRange::new(3, 50).unwrap()
}

fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        // resource line, possibly with attributes around the URL
        (3u32..=50, "[A-Z]{1,8}", "[ a-z=\"]{0,6}", "[ a-z?=&0-9]{0,8}").prop_map(
            |(id, channel, before, after)| {
                format!("{before}https://fl{id}.moveonjoy.com/{channel}/index.m3u8{after}")
            }
        ),
        // out-of-range and malformed ids stay opaque
        (0u32..200).prop_map(|id| format!("https://fl{id}.moveonjoy.com/X/index.m3u8")),
        Just("https://flX.moveonjoy.com/X/index.m3u8".to_string()),
        // metadata and free text
        "#EXTINF:-1 tvg-id=\"[a-z]{1,6}\",[A-Za-z ]{0,12}",
        "[^\r\n]{0,40}",
    ]
}

fn catalog_strategy() -> impl Strategy<Value = String> {
    (
        prop::collection::vec((line_strategy(), any::<bool>()), 0..30),
        any::<bool>(),
    )
        .prop_map(|(lines, final_newline)| {
            let count = lines.len();
            let mut out = String::new();
            for (i, (line, crlf)) in lines.into_iter().enumerate() {
                out.push_str(&line);
                if i + 1 < count || final_newline {
                    out.push_str(if crlf { "\r\n" } else { "\n" });
                }
            }
            out
        })
}

proptest! {
    #[test]
    fn prop_parse_render_is_lossless(content in catalog_strategy()) {
        let dir = Directory::parse(&content, &locator(), range(), None);
        prop_assert_eq!(dir.render(), content);
        prop_assert!(!dir.is_dirty());
    }

    #[test]
    fn prop_moving_away_and_back_is_lossless(content in catalog_strategy(), target in 3u32..=50) {
        let mut dir = Directory::parse(&content, &locator(), range(), None);
        let loaded: Vec<MirrorId> = dir.resources().iter().map(|r| r.current()).collect();

        for index in 0..dir.len() {
            dir.set_current(index, MirrorId(target)).unwrap();
        }
        for (index, id) in loaded.into_iter().enumerate() {
            dir.set_current(index, id).unwrap();
        }

        prop_assert_eq!(dir.render(), content);
    }

    #[test]
    fn prop_rewrite_touches_only_the_host(content in catalog_strategy(), target in 3u32..=50) {
        let mut dir = Directory::parse(&content, &locator(), range(), None);
        prop_assume!(!dir.is_empty());
        let loaded = dir.resources()[0].current();
        prop_assume!(loaded.get() != target);

        dir.set_current(0, MirrorId(target)).unwrap();
        let rendered = dir.render();

        let before: Vec<&str> = content.split('\n').collect();
        let after: Vec<&str> = rendered.split('\n').collect();
        prop_assert_eq!(before.len(), after.len());

        let line = dir.resources()[0].line_number() - 1;
        for (i, (old, new)) in before.iter().zip(&after).enumerate() {
            if i == line {
                let expected = old.replacen(
                    &format!("fl{loaded}.moveonjoy.com"),
                    &format!("fl{target}.moveonjoy.com"),
                    1,
                );
                prop_assert_eq!(new, &expected.as_str());
            } else {
                prop_assert_eq!(old, new);
            }
        }
    }
}

#[test]
fn test_crlf_and_missing_final_newline_survive_rewrite() {
    let content = "#EXTM3U\r\n#EXTINF:-1,A\r\nhttps://fl10.moveonjoy.com/A/index.m3u8";
    let mut dir = Directory::parse(content, &locator(), range(), None);

    assert_eq!(dir.len(), 1);
    assert!(dir.set_current(0, MirrorId(33)).unwrap());
    assert_eq!(
        dir.render(),
        "#EXTM3U\r\n#EXTINF:-1,A\r\nhttps://fl33.moveonjoy.com/A/index.m3u8"
    );
}

#[test]
fn test_only_first_url_on_a_line_is_managed() {
    let content = "https://fl10.moveonjoy.com/A/index.m3u8 backup=https://fl12.moveonjoy.com/A/index.m3u8\n";
    let mut dir = Directory::parse(content, &locator(), range(), None);

    assert_eq!(dir.len(), 1);
    dir.set_current(0, MirrorId(20)).unwrap();
    assert_eq!(
        dir.render(),
        "https://fl20.moveonjoy.com/A/index.m3u8 backup=https://fl12.moveonjoy.com/A/index.m3u8\n"
    );
}

#[test]
fn test_set_current_rejects_out_of_range() {
    let mut dir = Directory::parse(
        "https://fl10.moveonjoy.com/A/index.m3u8\n",
        &locator(),
        range(),
        None,
    );
    assert!(dir.set_current(0, MirrorId(51)).is_err());
    assert!(dir.set_current(0, MirrorId(2)).is_err());
    assert_eq!(dir.resources()[0].current(), MirrorId(10));
}

#[test]
fn test_discovery_prefers_recursive_match() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("lists/usa")).unwrap();
    std::fs::create_dir_all(root.path().join(".git")).unwrap();
    std::fs::create_dir_all(root.path().join("PrimeVision")).unwrap();
    std::fs::write(root.path().join(".git/us.m3u"), "hidden").unwrap();
    std::fs::write(root.path().join("lists/usa/us.m3u"), "#EXTM3U\n").unwrap();
    std::fs::write(root.path().join("PrimeVision/other.m3u"), "#EXTM3U\n").unwrap();

    let found = find_catalog(root.path(), &CatalogConfig::default()).unwrap();
    assert_eq!(found, root.path().join("lists/usa/us.m3u"));
}

#[test]
fn test_discovery_missing_catalog() {
    let root = TempDir::new().unwrap();
    assert!(find_catalog(root.path(), &CatalogConfig::default()).is_err());
    assert!(find_catalog(&root.path().join("absent.m3u"), &CatalogConfig::default()).is_err());
}
