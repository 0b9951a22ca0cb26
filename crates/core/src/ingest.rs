use crate::error::MatchError;
use crate::loader::load_path;
use crate::orchestrator::SignatureSearch;
use crate::traits::{DocumentStore, SignatureGenerator};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];

pub fn discover_image_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_image = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });

        if is_image {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct AddedImage {
    pub path: PathBuf,
    pub id: String,
}

pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub added: Vec<AddedImage>,
    pub skipped_files: Vec<SkippedImage>,
}

/// Indexes every image below `folder`.
///
/// Files that cannot be read or decoded are skipped and reported; a store failure aborts the
/// run.
pub async fn add_folder_best_effort<S, G>(
    search: &SignatureSearch<S, G>,
    folder: &Path,
) -> Result<IngestionReport, MatchError>
where
    S: DocumentStore,
    G: SignatureGenerator,
{
    let files = discover_image_files(folder);

    if files.is_empty() {
        return Err(MatchError::InvalidArgument(format!(
            "no image files found in {}",
            folder.display()
        )));
    }

    let mut added = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        let stored_path = path.to_string_lossy().to_string();
        let outcome = match load_path(&path).await {
            Ok(image) => search.add_pixels(&stored_path, &image, None).await,
            Err(error) => Err(error),
        };

        match outcome {
            Ok(id) => added.push(AddedImage { path, id }),
            Err(error @ MatchError::Insertion(_)) => return Err(error),
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped image");
                skipped_files.push(SkippedImage {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(IngestionReport {
        added,
        skipped_files,
    })
}

#[cfg(test)]
mod tests {
    use super::{add_folder_best_effort, discover_image_files};
    use crate::models::SearchConfig;
    use crate::orchestrator::SignatureSearch;
    use crate::signature::GridSignature;
    use crate::stores::MemoryStore;
    use image::{GrayImage, Luma};
    use std::fs;
    use tempfile::tempdir;

    fn search() -> Result<SignatureSearch<MemoryStore, GridSignature>, crate::MatchError> {
        SignatureSearch::new(
            MemoryStore::new(),
            GridSignature { grid_size: 2, k: 2 },
            SearchConfig {
                n: 32,
                k: 2,
                grid_size: 2,
                min_overlap: 2,
                ..SearchConfig::default()
            },
        )
    }

    #[test]
    fn discover_image_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        fs::write(base.join("a.PNG"), b"fake")?;
        fs::write(nested.join("b.jpeg"), b"fake")?;
        fs::write(nested.join("notes.txt"), b"not an image")?;

        let files = discover_image_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn ingestion_fails_without_images() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let search = search()?;
        assert!(add_folder_best_effort(&search, dir.path()).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn best_effort_skips_undecodable_images() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let image = GrayImage::from_fn(32, 32, |x, y| Luma([(x * 7 + y * 3) as u8]));
        image.save(dir.path().join("good.png"))?;
        fs::write(dir.path().join("broken.jpg"), b"\xff\xd8 truncated")?;

        let search = search()?;
        let report = add_folder_best_effort(&search, dir.path()).await?;

        assert_eq!(report.added.len(), 1);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("broken.jpg")
        );
        assert_eq!(search.store().len().await, 1);
        Ok(())
    }
}
