use crate::policy::{AssetMixBlock, FilteredSiteData, PublicArticle};
use crate::types::Result;
use crate::utils::html::escape;
use crate::utils::url::is_http_url;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ENTRY_PAGE: &str = "index.html";
/// The only file that carries the volatile "generated at" timestamp.
pub const STATUS_PAGE: &str = "status.html";
pub const STYLESHEET: &str = "assets/style.css";
pub const PACK_DIR: &str = "packs";
pub const NO_UPDATES: &str = "No updates";

const BASE_TEMPLATE: &str = include_str!("../templates/base.html");
const STYLESHEET_SOURCE: &str = include_str!("../templates/style.css");

/// A complete static site tree: ordered relative paths to file contents.
/// Built once per run and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteArtifact {
    files: BTreeMap<String, Vec<u8>>,
}

impl SiteArtifact {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(p, b)| (p.as_str(), b.as_slice()))
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Every file except the volatile status page.
    pub fn stable_files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files().filter(|(path, _)| *path != STATUS_PAGE)
    }

    /// Write the tree to `out_dir`, replacing whatever was there.
    ///
    /// Files go to a sibling staging directory first; the previous tree is
    /// only removed once the new one is fully written.
    pub fn publish(&self, out_dir: &Path) -> Result<()> {
        let out_dir = resolve_out_dir(out_dir)?;
        let out_dir = out_dir.as_path();
        let staging = sibling(out_dir, "staging");
        let previous = sibling(out_dir, "previous");

        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        for (path, bytes) in &self.files {
            let target = staging.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, bytes)?;
        }

        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }
        if out_dir.exists() {
            fs::rename(out_dir, &previous)?;
        }
        fs::rename(&staging, out_dir)?;
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }

        info!("Published {} files to {}", self.files.len(), out_dir.display());
        Ok(())
    }

    fn insert(&mut self, path: impl Into<String>, contents: String) {
        self.files.insert(path.into(), contents.into_bytes());
    }
}

/// `out_dir` with a real final component, so staging can sit beside it.
/// Paths like `.` or `site/..` are resolved; the filesystem root is refused.
fn resolve_out_dir(out_dir: &Path) -> Result<PathBuf> {
    if out_dir.file_name().is_some() {
        return Ok(out_dir.to_path_buf());
    }
    let resolved = out_dir.canonicalize()?;
    if resolved.file_name().is_none() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot publish into {}", resolved.display()),
        )
        .into());
    }
    Ok(resolved)
}

fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "site".to_string());
    dir.with_file_name(format!(".{}.{}", name, suffix))
}

pub fn pack_page_path(pack: &str) -> String {
    format!("{}/{}.html", PACK_DIR, pack)
}

/// Render the site. Output depends only on `data`; apart from the status
/// page, it does not depend on `data.generated_at` either.
pub fn render(data: &FilteredSiteData) -> SiteArtifact {
    let mut artifact = SiteArtifact::default();
    let offset = data.display_offset;

    artifact.insert(STYLESHEET, STYLESHEET_SOURCE.to_string());

    let mut index = String::new();
    if let Some(block) = &data.asset_mix {
        index.push_str(&asset_mix_card(block));
    }
    index.push_str(&cards(&data.entry, offset));
    artifact.insert(ENTRY_PAGE, page(data, "", "Today", &index));

    for pack in &data.packs {
        let content = cards(&pack.articles, offset);
        artifact.insert(pack_page_path(&pack.name), page(data, "../", &pack.title, &content));
    }

    artifact.insert(STATUS_PAGE, page(data, "", "Source status", &status_content(data)));

    debug!("Rendered {} files", artifact.len());
    artifact
}

fn page(data: &FilteredSiteData, root: &str, title: &str, content: &str) -> String {
    let mut nav = format!("<a href=\"{}{}\">Today</a>", root, ENTRY_PAGE);
    for pack in &data.packs {
        let _ = write!(
            nav,
            "<a href=\"{}{}\">{}</a>",
            root,
            pack_page_path(&pack.name),
            escape(&pack.title)
        );
    }

    fill(
        BASE_TEMPLATE,
        &[
            ("title", escape(title)),
            ("site_title", escape(&data.site_title)),
            ("subtitle", escape(&data.subtitle)),
            ("root", root.to_string()),
            ("nav", nav),
            ("content", content.to_string()),
        ],
    )
}

/// Single-pass `{{ key }}` substitution; substituted text is not rescanned.
fn fill(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;
    while let Some(start) = rest.find("{{ ") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 3..];
        match after.find(" }}") {
            Some(end) => {
                let key = &after[..end];
                match values.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 3 + end + 3]),
                }
                rest = &after[end + 3..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn cards(articles: &[PublicArticle], offset: FixedOffset) -> String {
    if articles.is_empty() {
        return format!("<p class=\"card empty\">{}</p>\n", NO_UPDATES);
    }
    articles.iter().map(|a| card(a, offset)).collect()
}

fn card(article: &PublicArticle, offset: FixedOffset) -> String {
    let title = escape(&article.title);
    let heading = match article.url.as_deref().filter(|u| is_http_url(u)) {
        Some(url) => format!(
            "<a class=\"link\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
            escape(url),
            title
        ),
        None => title,
    };

    format!(
        "<article class=\"card\">\
         <div class=\"meta\"><span class=\"badge\">{}</span><time datetime=\"{}\">{}</time></div>\
         <h2 class=\"title\">{}</h2>\
         <p class=\"summary\">{}</p>\
         </article>\n",
        escape(&article.source),
        article.published_at.format("%Y-%m-%dT%H:%M:%SZ"),
        local_time(article.published_at, offset),
        heading,
        escape(&article.summary)
    )
}

fn asset_mix_card(block: &AssetMixBlock) -> String {
    let mut html = String::from("<section class=\"card asset-mix\"><div class=\"meta\"><span class=\"badge\">Asset mix</span></div>");
    if block.entries.is_empty() {
        html.push_str("<p class=\"summary empty\">No asset mix configured</p>");
    } else {
        html.push_str("<div class=\"meta\">");
        for entry in &block.entries {
            let _ = write!(
                html,
                "<span class=\"badge\">{}: {:.*}</span>",
                escape(&entry.category),
                block.decimals,
                entry.fraction
            );
        }
        html.push_str("</div>");
    }
    html.push_str("</section>\n");
    html
}

fn status_content(data: &FilteredSiteData) -> String {
    let mut html = String::new();
    if data.sources.is_empty() {
        html.push_str("<p class=\"card empty\">No sources enabled</p>\n");
    }
    for line in &data.sources {
        let detail = line
            .detail
            .as_deref()
            .map(|d| format!(" - {}", escape(d)))
            .unwrap_or_default();
        let _ = writeln!(
            html,
            "<p class=\"summary\">[{}] {} ({}){}</p>",
            escape(&line.status),
            escape(&line.name),
            escape(&line.kind),
            detail
        );
    }
    let _ = writeln!(
        html,
        "<p class=\"meta\" id=\"generated-at\">Generated at {}</p>",
        local_time(data.generated_at, data.display_offset)
    );
    html
}

fn local_time(at: DateTime<Utc>, offset: FixedOffset) -> String {
    format!("{} UTC{}", at.with_timezone(&offset).format("%Y-%m-%d %H:%M"), offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_does_not_rescan_substituted_text() {
        let out = fill(
            "<h1>{{ title }}</h1>{{ content }}{{ unknown }}",
            &[("title", "{{ content }}".to_string()), ("content", "body".to_string())],
        );
        assert_eq!(out, "<h1>{{ content }}</h1>body{{ unknown }}");
    }
}
