//! Input discovery and output paths.
//!
//! Input:  `{raw_data_dir}/{year}/{month}/{day}/**/*.{ext}`
//! Output: `{processed_data_dir}/{year}_{month}/...`

use std::fs;
use std::path::{Path, PathBuf};
use stream_core::Result;
use tracing::warn;

pub const MARKET_REFERENCE_FILE: &str = "market_reference.parquet";
pub const RUNNER_REFERENCE_FILE: &str = "runner_reference.parquet";
pub const MARKET_TIMELINE_FILE: &str = "market_timeline.parquet";
pub const RUNNER_STATUS_FILE: &str = "runner_status.parquet";
pub const DAILY_PRICES_DIR: &str = "daily_prices";

/// One processing unit: a calendar month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthUnit {
    pub year: i32,
    /// Month directory name, e.g. `Dec`.
    pub month: String,
}

impl MonthUnit {
    pub fn new(year: i32, month: impl Into<String>) -> Self {
        Self {
            year,
            month: month.into(),
        }
    }
}

impl std::fmt::Display for MonthUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.year, self.month)
    }
}

/// A day directory inside a month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayDir {
    /// Numeric day, used for ordering.
    pub day: u32,
    /// Directory name as found on disk, used in output file names.
    pub name: String,
    pub path: PathBuf,
}

/// Layout of the raw input tree.
#[derive(Debug, Clone)]
pub struct InputLayout {
    root: PathBuf,
    extension: String,
}

impl InputLayout {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension: String = extension.into();
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Directory holding a month's day folders.
    pub fn month_dir(&self, unit: &MonthUnit) -> PathBuf {
        self.root.join(unit.year.to_string()).join(&unit.month)
    }

    /// Day directories of a month, in numeric day order.
    ///
    /// Entries whose name is not a day number are skipped with a warning.
    pub fn days(&self, month_dir: &Path) -> Result<Vec<DayDir>> {
        let mut days = Vec::new();

        for entry in fs::read_dir(month_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match name.parse::<u32>() {
                Ok(day) => days.push(DayDir { day, name, path }),
                Err(_) => warn!(dir = %path.display(), "ignoring non-numeric day directory"),
            }
        }

        days.sort_by_key(|d| d.day);
        Ok(days)
    }

    /// Source files under a day directory, searched recursively, sorted by path.
    pub fn source_files(&self, day_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        self.collect_sources(day_dir, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn collect_sources(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            // Directory symlinks are not followed.
            if entry.file_type()?.is_dir() {
                self.collect_sources(&path, files)?;
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension.as_str()))
            {
                files.push(path);
            }
        }
        Ok(())
    }
}

/// Layout of the processed output tree.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `{root}/{year}_{month}`
    pub fn month_dir(&self, unit: &MonthUnit) -> PathBuf {
        self.root.join(format!("{}_{}", unit.year, unit.month))
    }

    /// `{root}/{year}_{month}/daily_prices`
    pub fn daily_prices_dir(&self, unit: &MonthUnit) -> PathBuf {
        self.month_dir(unit).join(DAILY_PRICES_DIR)
    }

    /// `{root}/{year}_{month}/daily_prices/runner_prices_{year}_{month}_{day}.parquet`
    pub fn daily_prices_file(&self, unit: &MonthUnit, day: &str) -> PathBuf {
        self.daily_prices_dir(unit).join(format!(
            "runner_prices_{}_{}_{}.parquet",
            unit.year, unit.month, day
        ))
    }
}

/// Total size in bytes of regular files under `path`. Symlinks are not followed.
pub fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| match entry.file_type() {
            Ok(ft) if ft.is_dir() => dir_size(&entry.path()),
            Ok(ft) if ft.is_file() => entry.metadata().map(|m| m.len()).unwrap_or(0),
            _ => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["10", "2", "1", "notes"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("3"), b"file, not a dir").unwrap();

        let layout = InputLayout::new(dir.path(), "bz2");
        let days = layout.days(dir.path()).unwrap();
        let names: Vec<_> = days.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["1", "2", "10"]);
    }

    #[test]
    fn test_source_files_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("29536104").join("1.2345");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("1.2345.bz2"), b"").unwrap();
        fs::write(dir.path().join("1.1.BZ2"), b"").unwrap();
        fs::write(dir.path().join("readme.txt"), b"").unwrap();

        let files = InputLayout::new("unused", ".bz2")
            .source_files(dir.path())
            .unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.to_string_lossy().to_lowercase().ends_with(".bz2")));
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_symlinks_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.bz2"), b"").unwrap();
        std::os::unix::fs::symlink(".", dir.path().join("loop")).unwrap();

        let files = InputLayout::new("unused", "bz2")
            .source_files(dir.path())
            .unwrap();
        assert_eq!(files, vec![dir.path().join("a.bz2")]);
    }

    #[test]
    fn test_paths() {
        let unit = MonthUnit::new(2024, "Dec");
        let input = InputLayout::new("/raw", "bz2");
        assert_eq!(input.month_dir(&unit), PathBuf::from("/raw/2024/Dec"));

        let output = OutputLayout::new("/out");
        assert_eq!(output.month_dir(&unit), PathBuf::from("/out/2024_Dec"));
        assert_eq!(
            output.daily_prices_file(&unit, "7"),
            PathBuf::from("/out/2024_Dec/daily_prices/runner_prices_2024_Dec_7.parquet")
        );
        assert_eq!(unit.to_string(), "2024/Dec");
    }

    #[test]
    fn test_dir_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("sub").join("b"), vec![0u8; 32]).unwrap();

        assert_eq!(dir_size(dir.path()), 42);
        assert_eq!(dir_size(&dir.path().join("missing")), 0);
    }
}
