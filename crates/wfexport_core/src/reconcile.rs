use std::path::PathBuf;

use anyhow::Result;

use crate::frontmatter::{self, FrontMatter};
use crate::slug::SlugAllocator;
use crate::source::{Category, ContentRow};

pub const DEFAULT_TITLE: &str = "Post";

/// One row after merging column values with its embedded front matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledItem {
    pub category: Category,
    pub id: i64,
    pub slug: String,
    pub metadata: FrontMatter,
    pub prelude: Option<String>,
    pub body: String,
}

impl ReconciledItem {
    /// Path relative to the content directory, e.g. `posts/hello.md`.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.category.folder()).join(format!("{}.md", self.slug))
    }

    pub fn render(&self) -> String {
        let mut out = frontmatter::encode(&self.metadata);
        if let Some(prelude) = &self.prelude {
            out.push_str(prelude);
            out.push_str("\n\n");
        }
        out.push_str(&self.body);
        out
    }
}

/// Merge `row` with the front matter embedded in its content.
///
/// Column values take precedence over embedded ones. Empty strings count as
/// missing on both sides. The slug is claimed from `allocator` only after the
/// content decodes, so a malformed row leaves the registry untouched.
pub fn reconcile(
    category: Category,
    row: &ContentRow,
    allocator: &mut SlugAllocator,
) -> Result<ReconciledItem> {
    let decoded = frontmatter::decode(&row.content)?;
    let embedded = &decoded.front_matter;

    let slug = allocator.allocate(
        present(row.slug.as_deref()).or(present(embedded.get("slug"))),
        row.id,
    );
    let title = present(row.title.as_deref())
        .or(present(embedded.get("title")))
        .or(present(row.slug.as_deref()))
        .unwrap_or(DEFAULT_TITLE)
        .to_string();

    let mut metadata = FrontMatter::new();
    metadata.insert("slug", Some(slug.clone()));
    metadata.insert("title", Some(title));

    let mut prelude = None;
    match category {
        Category::Page => {}
        Category::Post => {
            let reference = present(embedded.get("ref"));
            let image = present(embedded.get("image"));
            metadata.insert("created", created(row, embedded));
            metadata.insert("ref", reference.map(str::to_string));
            metadata.insert("image", image.map(str::to_string));
            prelude = post_prelude(image, reference);
        }
        Category::Draft => {
            metadata.insert("created", created(row, embedded));
        }
    }

    Ok(ReconciledItem {
        category,
        id: row.id,
        slug,
        metadata,
        prelude,
        body: decoded.body,
    })
}

pub fn post_prelude(image: Option<&str>, reference: Option<&str>) -> Option<String> {
    match (image, reference) {
        (Some(image), Some(reference)) => Some(format!("[![image]({image})]({reference})")),
        (Some(image), None) => Some(format!("![image]({image})")),
        (None, Some(reference)) => Some(format!("[Reference]({reference})")),
        (None, None) => None,
    }
}

fn created(row: &ContentRow, embedded: &FrontMatter) -> Option<String> {
    present(row.created.as_deref())
        .or(present(embedded.get("date")))
        .map(str::to_string)
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}
