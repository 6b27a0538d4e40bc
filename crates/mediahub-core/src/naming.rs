//! Deterministic storage paths and file names.
//!
//! Every asset lives under `{prefix}/{id}/` on its disk and its conversions under
//! `{prefix}/{id}/conversions/` on its conversions disk. Nothing here touches I/O.
//! Changing the prefix after assets exist orphans the old files; there is no
//! automatic migration.

use uuid::Uuid;

use crate::models::Asset;

const CONVERSIONS_DIR: &str = "conversions";
const FALLBACK_STEM: &str = "file";

/// Builds storage paths from asset identity and the configured prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNamer {
    prefix: String,
}

impl PathNamer {
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: prefix.as_ref().trim_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `{prefix}/{id}`, or just `{id}` when no prefix is configured.
    pub fn base_path(&self, id: Uuid) -> String {
        if self.prefix.is_empty() {
            id.to_string()
        } else {
            format!("{}/{}", self.prefix, id)
        }
    }

    pub fn original_dir(&self, id: Uuid) -> String {
        format!("{}/", self.base_path(id))
    }

    pub fn conversions_dir(&self, id: Uuid) -> String {
        format!("{}/{}/", self.base_path(id), CONVERSIONS_DIR)
    }

    pub fn original_path(&self, asset: &Asset) -> String {
        format!("{}{}", self.original_dir(asset.id), asset.file_name)
    }

    pub fn conversion_file_name(&self, file_name: &str, conversion_name: &str) -> String {
        let (stem, extension) = split_name_and_extension(file_name);
        format_file_name(&format!("{}_{}", stem, conversion_name), &extension)
    }

    pub fn conversion_path(&self, asset: &Asset, conversion_name: &str) -> String {
        format!(
            "{}{}",
            self.conversions_dir(asset.id),
            self.conversion_file_name(&asset.file_name, conversion_name)
        )
    }

    /// Path of a conversion file already recorded on the asset.
    pub fn stored_conversion_path(&self, asset: &Asset, stored_file_name: &str) -> String {
        format!("{}{}", self.conversions_dir(asset.id), stored_file_name)
    }
}

/// Split `photo.final.JPG` into (`photo.final`, `JPG`). Dotfiles keep their name as stem.
pub fn split_name_and_extension(file_name: &str) -> (String, String) {
    let base = base_name(file_name);
    match base.rfind('.') {
        Some(idx) if idx > 0 => (base[..idx].to_string(), base[idx + 1..].to_string()),
        _ => (base.to_string(), String::new()),
    }
}

pub fn format_file_name(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}

/// Last path segment of a file name or key.
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Slugify the stem with `_` as separator and lower-case the extension.
///
/// `My Holiday Photo (1).JPG` becomes `my_holiday_photo_1.jpg`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let (stem, extension) = split_name_and_extension(file_name);
    let mut slug = slugify(&stem, '_');
    if slug.is_empty() {
        slug = FALLBACK_STEM.to_string();
    }
    format_file_name(&slug, &slugify(&extension, '_'))
}

fn slugify(input: &str, separator: char) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_separator = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push(separator);
            }
            pending_separator = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewAsset;

    fn asset(file_name: &str) -> Asset {
        NewAsset {
            collection_name: "avatars".into(),
            disk: "public".into(),
            conversions_disk: "public".into(),
            file_name: file_name.into(),
            size: 1,
            mime_type: "image/jpeg".into(),
            content_hash: "h".into(),
        }
        .into_asset(chrono::Utc::now())
    }

    #[test]
    fn paths_follow_prefix_and_id() {
        let namer = PathNamer::new("/media/");
        let a = asset("photo.jpg");

        assert_eq!(namer.base_path(a.id), format!("media/{}", a.id));
        assert_eq!(namer.original_dir(a.id), format!("media/{}/", a.id));
        assert_eq!(
            namer.conversions_dir(a.id),
            format!("media/{}/conversions/", a.id)
        );
        assert_eq!(namer.original_path(&a), format!("media/{}/photo.jpg", a.id));
        assert_eq!(
            namer.conversion_path(&a, "thumb"),
            format!("media/{}/conversions/photo_thumb.jpg", a.id)
        );
    }

    #[test]
    fn paths_are_deterministic_and_distinct_per_id() {
        let namer = PathNamer::new("media");
        let a = asset("x.png");
        let b = asset("x.png");

        assert_eq!(namer.original_path(&a), namer.original_path(&a));
        assert_eq!(
            namer.conversion_path(&a, "thumb"),
            namer.conversion_path(&a, "thumb")
        );
        assert_ne!(namer.original_path(&a), namer.original_path(&b));
        assert_ne!(namer.conversions_dir(a.id), namer.conversions_dir(b.id));
    }

    #[test]
    fn empty_prefix_has_no_leading_slash() {
        let namer = PathNamer::new("");
        let a = asset("x.png");
        assert_eq!(namer.base_path(a.id), a.id.to_string());
    }

    #[test]
    fn conversion_file_name_keeps_extension() {
        let namer = PathNamer::new("media");
        assert_eq!(namer.conversion_file_name("a.b.webp", "sm"), "a.b_sm.webp");
        assert_eq!(namer.conversion_file_name("README", "sm"), "README_sm");
    }

    #[test]
    fn sanitize_slugifies_stem() {
        assert_eq!(
            sanitize_file_name("My Holiday Photo (1).JPG"),
            "my_holiday_photo_1.jpg"
        );
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("ÄÖÜ.png"), "file.png");
        assert_eq!(sanitize_file_name("__a--b__"), "a_b");
    }

    #[test]
    fn split_handles_dotfiles_and_paths() {
        assert_eq!(
            split_name_and_extension("dir/.env"),
            (".env".to_string(), String::new())
        );
        assert_eq!(
            split_name_and_extension("a/b/c.tar.gz"),
            ("c.tar".to_string(), "gz".to_string())
        );
    }
}
