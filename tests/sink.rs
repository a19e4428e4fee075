// tests/sink.rs
use feedfilter::mapper::MetaTemplates;
use feedfilter::pipeline::build_feed;
use feedfilter::sink::{serialize, OutputFormat};
use feedfilter::source::{detect_format, parse_feed, FeedFormat};

const ATOM: &str = include_str!("fixtures/news_atom.xml");

fn canonical() -> feedfilter::model::CanonicalFeed {
    let src = parse_feed(ATOM).unwrap();
    let kept: Vec<_> = src.items.iter().collect();
    build_feed(&src, &kept, &MetaTemplates::default())
}

#[test]
fn every_sink_output_is_readable_as_its_own_format() {
    let feed = canonical();
    for (format, expected) in [
        (OutputFormat::Rss, FeedFormat::Rss),
        (OutputFormat::Atom, FeedFormat::Atom),
        (OutputFormat::Json, FeedFormat::JsonFeed),
    ] {
        let bytes = serialize(&feed, format).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(detect_format(&text), Ok(expected), "{format}");

        let back = parse_feed(&text).unwrap();
        assert_eq!(back.title, "Daily News", "{format}");
        let titles: Vec<_> = back.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Markets rally", "Local weather", "Election update"],
            "{format}"
        );
        let links: Vec<_> = back.items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(links[0], "https://news.example.com/markets-rally", "{format}");
        assert_eq!(back.items[0].guid, "news-1001", "{format}");
        // Singular canonical category: only the first survives.
        assert_eq!(back.items[0].categories, vec!["markets"], "{format}");
        assert_eq!(back.items[1].enclosures.len(), 1, "{format}");
        assert_eq!(back.items[1].enclosures[0].length, Some(48213), "{format}");
        assert_eq!(
            back.items[0].published.map(|t| t.timestamp()),
            feed.items[0].created.map(|t| t.timestamp()),
            "{format}"
        );
    }
}

#[test]
fn rss_output_declares_content_namespace() {
    let text = String::from_utf8(serialize(&canonical(), OutputFormat::Rss).unwrap()).unwrap();
    assert!(text.contains(r#"xmlns:content="http://purl.org/rss/1.0/modules/content/""#));
    assert!(text.contains("<managingEditor>desk@news.example.com (News Desk)</managingEditor>"));
}

#[test]
fn json_output_is_json_feed_1_1() {
    let bytes = serialize(&canonical(), OutputFormat::Json).unwrap();
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["version"], "https://jsonfeed.org/version/1.1");
    assert_eq!(v["items"].as_array().map(Vec::len), Some(3));
    assert_eq!(v["items"][0]["date_published"], "2024-07-01T08:00:00+02:00");
}
