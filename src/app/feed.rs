use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use time::format_description::well_known::Rfc2822;
use tracing::warn;

use crate::domain::post::Post;
use crate::store::Store;

/// Posts rendered into the syndication artifact.
const FEED_ITEM_COUNT: i64 = 10;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub path: PathBuf,
    pub title: String,
    pub site_url: String,
    pub description: String,
}

/// Regenerates the RSS artifact from the most recent posts and writes
/// it to a well-known location. Always best-effort: a failure here is
/// logged and discarded, never propagated to the operation that
/// triggered it.
#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn Store>,
    config: FeedConfig,
}

impl FeedService {
    pub fn new(store: Arc<dyn Store>, config: FeedConfig) -> Self {
        Self { store, config }
    }

    /// Fire-and-forget regeneration on its own task, detached from the
    /// caller's failure path.
    pub fn spawn_regenerate(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(err) = service.regenerate().await {
                warn!(error = ?err, "failed to regenerate feed");
            }
        });
    }

    pub async fn regenerate(&self) -> Result<()> {
        let posts = self.store.latest_posts(FEED_ITEM_COUNT).await?;
        let feed = render_feed(&self.config, &posts);
        tokio::fs::write(&self.config.path, feed).await?;
        Ok(())
    }
}

pub fn render_feed(config: &FeedConfig, posts: &[Post]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<rss version=\"2.0\">\n<channel>\n");
    out.push_str(&format!("<title>{}</title>\n", escape_xml(&config.title)));
    out.push_str(&format!("<link>{}</link>\n", escape_xml(&config.site_url)));
    out.push_str(&format!(
        "<description>{}</description>\n",
        escape_xml(&config.description)
    ));

    for post in posts {
        out.push_str("<item>\n");
        out.push_str(&format!("<title>{}</title>\n", escape_xml(&item_title(post))));
        out.push_str(&format!(
            "<link>{}/posts/{}</link>\n",
            escape_xml(config.site_url.trim_end_matches('/')),
            post.id
        ));
        out.push_str(&format!("<guid>{}</guid>\n", post.id));
        out.push_str(&format!(
            "<category>{}</category>\n",
            escape_xml(&post.tags)
        ));
        out.push_str(&format!(
            "<description>{}</description>\n",
            escape_xml(&post.content)
        ));
        if let Ok(date) = post.created_at.format(&Rfc2822) {
            out.push_str(&format!("<pubDate>{date}</pubDate>\n"));
        }
        out.push_str("</item>\n");
    }

    out.push_str("</channel>\n</rss>\n");
    out
}

/// Posts have no title field; the feed uses the opening of the content.
fn item_title(post: &Post) -> String {
    const TITLE_CHARS: usize = 80;
    let mut title: String = post.content.chars().take(TITLE_CHARS).collect();
    if post.content.chars().count() > TITLE_CHARS {
        title.push('…');
    }
    title
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
