use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FILENAME_PREFIX: &str = "generated-image-";
const PROMPT_CHARS: usize = 20;

/// `generated-image-<first 20 prompt chars>.png`, with anything outside
/// `[A-Za-z0-9_-]` replaced by `_`.
pub fn download_filename(prompt: &str) -> String {
    let stem: String = prompt
        .chars()
        .take(PROMPT_CHARS)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}.png", FILENAME_PREFIX, stem)
}

/// Where downloaded images end up.
pub trait ImageSaver {
    fn save(&self, bytes: &[u8], filename: &str) -> io::Result<PathBuf>;
}

/// Writes into one directory, adding `-1`, `-2`, ... instead of overwriting.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn free_path(&self, filename: &str) -> PathBuf {
        let candidate = self.dir.join(filename);
        if !candidate.exists() {
            return candidate;
        }

        let path = Path::new(filename);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        (1..)
            .map(|n| self.dir.join(format!("{}-{}{}", stem, n, extension)))
            .find(|p| !p.exists())
            .unwrap_or(candidate)
    }
}

impl ImageSaver for DirectorySaver {
    fn save(&self, bytes: &[u8], filename: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.free_path(filename);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_download_filename() {
        assert_eq!(
            download_filename("a red fox in snow"),
            "generated-image-a_red_fox_in_snow.png"
        );
        assert_eq!(
            download_filename("a very long prompt about whales and oceans"),
            "generated-image-a_very_long_prompt_a.png"
        );
        assert_eq!(download_filename("../etc/passwd"), "generated-image-___etc_passwd.png");
        assert_eq!(download_filename("café ☕"), "generated-image-caf___.png");
    }

    #[test]
    fn test_directory_saver_never_overwrites() {
        let dir = std::env::temp_dir().join(format!("fluxgen-test-{}", Uuid::new_v4()));
        let saver = DirectorySaver::new(&dir);

        let first = saver.save(b"one", "generated-image-fox.png").unwrap();
        let second = saver.save(b"two", "generated-image-fox.png").unwrap();

        assert_eq!(first, dir.join("generated-image-fox.png"));
        assert_eq!(second, dir.join("generated-image-fox-1.png"));
        assert_eq!(fs::read(&first).unwrap(), b"one");
        assert_eq!(fs::read(&second).unwrap(), b"two");

        fs::remove_dir_all(&dir).unwrap();
    }
}
