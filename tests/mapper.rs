// tests/mapper.rs
use feedfilter::mapper::{first_wins, map_feed, map_item, render_template, MetaTemplates};
use feedfilter::model::{Author, Enclosure, Link};
use feedfilter::source::parse_feed;
use pretty_assertions::assert_eq;

const RSS: &str = include_str!("fixtures/news_rss.xml");

#[test]
fn feed_metadata_goes_through_templates() {
    let src = parse_feed(RSS).unwrap();
    let meta = MetaTemplates {
        title: "[mirror] $$ORIG$$".into(),
        description: "Filtered: $$ORIG$$".into(),
        link: String::new(),
    };
    let feed = map_feed(&src, &meta);

    assert_eq!(feed.title, "[mirror] Daily News");
    assert_eq!(feed.description, format!("Filtered: {}", src.description));
    assert_eq!(
        feed.link,
        Some(Link {
            href: "https://news.example.com/".into()
        })
    );
    assert_eq!(feed.copyright, "Copyright 2024 Example News");
    assert_eq!(
        feed.author,
        Some(Author {
            name: "News Desk".into(),
            email: "desk@news.example.com".into()
        })
    );
    assert_eq!(feed.created, src.published);
    assert_eq!(feed.updated, src.updated);
    assert_eq!(feed.image.map(|i| i.url), Some("https://news.example.com/logo.png".to_string()));
    assert!(feed.items.is_empty(), "map_feed maps metadata only");
}

#[test]
fn default_templates_pass_values_through() {
    let src = parse_feed(RSS).unwrap();
    let feed = map_feed(&src, &MetaTemplates::default());
    assert_eq!(feed.title, src.title);
    assert_eq!(feed.description, src.description);
}

#[test]
fn items_take_the_first_of_each_multi_valued_field() {
    let src = parse_feed(RSS).unwrap();

    let markets = map_item(&src.items[0]);
    assert_eq!(markets.category.as_deref(), Some("markets"));
    assert_eq!(markets.author.as_ref().map(|a| a.name.as_str()), Some("Ann Analyst"));
    assert_eq!(markets.enclosure, None);
    assert_eq!(markets.id, "news-1001");
    assert_eq!(markets.link.href, "https://news.example.com/markets-rally");
    assert_eq!(markets.created, src.items[0].published);

    let weather = map_item(&src.items[1]);
    assert_eq!(
        weather.enclosure,
        Some(Enclosure {
            url: "https://news.example.com/weather.mp3".into(),
            length: Some(48213),
            mime_type: "audio/mpeg".into(),
        })
    );
    assert_eq!(weather.author, None);
}

#[test]
fn map_item_is_idempotent() {
    let src = parse_feed(RSS).unwrap();
    for item in &src.items {
        assert_eq!(map_item(item), map_item(item));
    }
}

#[test]
fn first_wins_and_templates_stand_alone() {
    assert_eq!(first_wins(&["a", "b", "c"], |s| s.to_string()), Some("a".to_string()));
    assert_eq!(first_wins::<&str, String>(&[], |s| s.to_string()), None);
    assert_eq!(render_template("", "x"), "");
    assert_eq!(render_template("$$ORIG$$ and $$ORIG$$", "x"), "x and x");
}
