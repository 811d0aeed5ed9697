use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use super::dataset::{check_index, Dataset, Sample, SampleOf};
use super::error::DataLoaderError;
use super::image_data::{ImageData, ImageShape};

/// Label parsed from the label columns of a CSV manifest row.
#[derive(Clone, Debug, PartialEq)]
pub enum ManifestLabel {
    None,
    Class(String),
    MultiClass(Vec<String>),
    Continuous(Vec<f32>),
}

/// Column selector for CSV manifests.
#[derive(Clone, Debug)]
pub enum Column {
    Index(usize),
    Name(String),
}

impl From<usize> for Column {
    fn from(idx: usize) -> Self {
        Column::Index(idx)
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::Name(name.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct CsvManifestConfig {
    pub image_column: Column,
    pub label_columns: Vec<Column>,
    pub has_header: bool,
    pub delimiter: char,
    /// Parse label columns as numbers into [`ManifestLabel::Continuous`].
    pub continuous_labels: bool,
    pub verify_files: bool,
}

impl Default for CsvManifestConfig {
    fn default() -> Self {
        Self {
            image_column: Column::Index(0),
            label_columns: vec![Column::Index(1)],
            has_header: true,
            delimiter: ',',
            continuous_labels: false,
            verify_files: false,
        }
    }
}

impl CsvManifestConfig {
    pub fn image_column(mut self, col: impl Into<Column>) -> Self {
        self.image_column = col.into();
        self
    }

    pub fn label_columns<C: Into<Column>>(mut self, cols: impl IntoIterator<Item = C>) -> Self {
        self.label_columns = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_header(mut self, h: bool) -> Self {
        self.has_header = h;
        self
    }

    pub fn delimiter(mut self, d: char) -> Self {
        self.delimiter = d;
        self
    }

    pub fn continuous_labels(mut self, c: bool) -> Self {
        self.continuous_labels = c;
        self
    }

    pub fn verify_files(mut self, v: bool) -> Self {
        self.verify_files = v;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct ImageDirConfig {
    /// `read_dir` order is filesystem dependent. Sorting gives the same
    /// manifest on every machine.
    pub sort_dataset: bool,
    pub verify_files: bool,
}

impl ImageDirConfig {
    pub fn sort_dataset(mut self, s: bool) -> Self {
        self.sort_dataset = s;
        self
    }

    pub fn verify_files(mut self, v: bool) -> Self {
        self.verify_files = v;
        self
    }
}

/// Lazily decoded image dataset. Only the manifest lives in memory; each
/// `get` opens and decodes one file.
#[derive(Debug)]
pub struct ImageManifestDataset<L> {
    entries: Vec<(PathBuf, L)>,
    class_names: Vec<String>,
    image_shape: ImageShape,
    name: String,
}

impl<L> ImageManifestDataset<L> {
    /// Builds from explicit `(path, label)` rows. The first image is opened to
    /// record the shape every other image must match.
    pub fn from_entries(
        name: impl Into<String>,
        entries: Vec<(PathBuf, L)>,
        verify_files: bool,
    ) -> Result<Self, DataLoaderError>
    where
        L: Sync,
    {
        let name = name.into();
        let first = match entries.first() {
            Some((path, _)) => path.clone(),
            None => return Err(DataLoaderError::EmptyDataset(name)),
        };

        if verify_files {
            verify_paths(&entries)?;
        }

        let image_shape = probe_image(&first)?;

        tracing::info!(
            dataset = %name,
            samples = entries.len(),
            shape = %image_shape,
            "indexed image manifest"
        );

        Ok(ImageManifestDataset {
            entries,
            class_names: Vec::new(),
            image_shape,
            name,
        })
    }

    pub fn image_shape(&self) -> ImageShape {
        self.image_shape
    }

    pub fn entries(&self) -> &[(PathBuf, L)] {
        &self.entries
    }

    pub fn path(&self, index: usize) -> Result<&Path, DataLoaderError> {
        check_index(index, self.entries.len())?;
        Ok(&self.entries[index].0)
    }
}

impl ImageManifestDataset<usize> {
    /// One subdirectory of `root` per class. Labels are indices into the
    /// sorted class names. Files with extensions `image` cannot decode are skipped.
    pub fn from_class_dirs(
        root: impl AsRef<Path>,
        config: ImageDirConfig,
    ) -> Result<Self, DataLoaderError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(DataLoaderError::DirectoryNotFound(root.to_owned()));
        }

        let valid_extensions: HashSet<String> = image::ImageFormat::all()
            .flat_map(|format| format.extensions_str())
            .map(|ext| ext.to_string())
            .collect();

        let mut class_dirs: Vec<(String, PathBuf)> = read_dir(root)?
            .into_iter()
            .filter(|path| path.is_dir())
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_owned();
                Some((name, path))
            })
            .collect();
        // Class indices must not depend on the filesystem
        class_dirs.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut entries = Vec::new();
        for (class_idx, (_, dir)) in class_dirs.iter().enumerate() {
            let mut files: Vec<PathBuf> = read_dir(dir)?
                .into_iter()
                .filter(|path| is_valid_extension(&valid_extensions, path))
                .collect();
            if config.sort_dataset {
                files.sort_unstable();
            }
            entries.extend(files.into_iter().map(|path| (path, class_idx)));
        }

        let mut dataset = Self::from_entries(
            root.display().to_string(),
            entries,
            config.verify_files,
        )?;
        dataset.class_names = class_dirs.into_iter().map(|(name, _)| name).collect();
        Ok(dataset)
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

impl ImageManifestDataset<ManifestLabel> {
    /// Relative image paths resolve against the manifest's directory.
    pub fn from_csv(
        path: impl AsRef<Path>,
        config: CsvManifestConfig,
    ) -> Result<Self, DataLoaderError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| {
            DataLoaderError::DatasetUnreadable {
                path: path.to_owned(),
                source,
            }
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut dataset = Self::from_csv_str(&content, base_dir, config)?;
        dataset.name = path.display().to_string();
        Ok(dataset)
    }

    pub fn from_csv_str(
        content: &str,
        base_dir: impl AsRef<Path>,
        config: CsvManifestConfig,
    ) -> Result<Self, DataLoaderError> {
        let base_dir = base_dir.as_ref();
        let delim = config.delimiter;

        // (1-based line number, line)
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l))
            .filter(|(_, l)| !l.trim().is_empty());

        let header: Option<Vec<String>> = if config.has_header {
            match lines.next() {
                Some((_, l)) => Some(l.split(delim).map(|c| c.trim().to_string()).collect()),
                None => return Err(DataLoaderError::EmptyDataset("csv manifest".into())),
            }
        } else {
            None
        };

        let resolve = |col: &Column| -> Result<usize, DataLoaderError> {
            match (col, &header) {
                (Column::Index(idx), _) => Ok(*idx),
                (Column::Name(name), Some(header)) => header
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| DataLoaderError::InvalidManifest {
                        line: 1,
                        reason: format!("no column named {name:?}"),
                    }),
                (Column::Name(name), None) => Err(DataLoaderError::InvalidManifest {
                    line: 1,
                    reason: format!("column {name:?} selected by name but the manifest has no header"),
                }),
            }
        };

        let image_col = resolve(&config.image_column)?;
        let label_cols = config
            .label_columns
            .iter()
            .map(resolve)
            .collect::<Result<Vec<_>, _>>()?;

        let mut num_cols = header.as_ref().map(|h| h.len());
        let mut entries = Vec::new();
        for (line, row) in lines {
            let cols: Vec<&str> = row.split(delim).map(str::trim).collect();
            let expected = *num_cols.get_or_insert(cols.len());
            if cols.len() != expected {
                return Err(DataLoaderError::InvalidManifest {
                    line,
                    reason: format!("{} columns, expected {}", cols.len(), expected),
                });
            }

            let field = |c: usize| {
                cols.get(c).copied().ok_or_else(|| DataLoaderError::InvalidManifest {
                    line,
                    reason: format!("column {c} does not exist"),
                })
            };

            let image = field(image_col)?;
            if image.is_empty() {
                return Err(DataLoaderError::InvalidManifest {
                    line,
                    reason: "empty image path".into(),
                });
            }

            let label = if config.continuous_labels {
                let values = label_cols
                    .iter()
                    .map(|&c| {
                        let raw = field(c)?;
                        raw.parse::<f32>().map_err(|e| DataLoaderError::InvalidManifest {
                            line,
                            reason: format!("column {c}: {raw:?} is not a number: {e}"),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                ManifestLabel::Continuous(values)
            } else {
                let mut values = label_cols
                    .iter()
                    .map(|&c| field(c).map(str::to_string))
                    .collect::<Result<Vec<_>, _>>()?;
                match values.len() {
                    0 => ManifestLabel::None,
                    1 => ManifestLabel::Class(values.remove(0)),
                    _ => ManifestLabel::MultiClass(values),
                }
            };

            entries.push((base_dir.join(image), label));
        }

        Self::from_entries("csv manifest", entries, config.verify_files)
    }
}

impl<L> Dataset for ImageManifestDataset<L>
where
    L: Clone + Send + Sync,
{
    type Features = ImageData;
    type Label = L;

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, index: usize) -> Result<SampleOf<Self>, DataLoaderError> {
        check_index(index, self.entries.len())?;
        let (path, label) = &self.entries[index];
        let image = ImageData::open(path)?;

        let found = image.shape();
        if found != self.image_shape {
            return Err(DataLoaderError::ShapeMismatch {
                what: path.display().to_string(),
                expected: self.image_shape.to_string(),
                found: found.to_string(),
            });
        }

        Ok(Sample::new(image, label.clone()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, DataLoaderError> {
    let unreadable = |source| DataLoaderError::DatasetUnreadable {
        path: dir.to_owned(),
        source,
    };
    std::fs::read_dir(dir)
        .map_err(unreadable)?
        .map(|entry| entry.map(|e| e.path()).map_err(unreadable))
        .collect()
}

fn is_valid_extension(valid_extensions: &HashSet<String>, path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| valid_extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
}

fn verify_paths<L: Sync>(entries: &[(PathBuf, L)]) -> Result<(), DataLoaderError> {
    match entries.par_iter().find_first(|(path, _)| !path.is_file()) {
        Some((path, _)) => Err(DataLoaderError::MissingFile(path.clone())),
        None => Ok(()),
    }
}

fn probe_image(path: &Path) -> Result<ImageShape, DataLoaderError> {
    let img = image::open(path).map_err(|source| DataLoaderError::ProbeFailed {
        path: path.to_owned(),
        source,
    })?;
    Ok(ImageData::from_dynamic(img).shape())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_manifest_is_a_construction_error() {
        let err = ImageManifestDataset::<u8>::from_entries("empty", Vec::new(), false).unwrap_err();
        assert!(matches!(err, DataLoaderError::EmptyDataset(_)));
    }

    #[test]
    fn csv_header_only() {
        let err = ImageManifestDataset::from_csv_str("path,label\n", ".", CsvManifestConfig::default())
            .unwrap_err();
        assert!(matches!(err, DataLoaderError::EmptyDataset(_)));
    }

    #[test]
    fn csv_unknown_column_name() {
        let config = CsvManifestConfig::default().label_columns(["species"]);
        let err = ImageManifestDataset::from_csv_str("path,label\na.png,1\n", ".", config)
            .unwrap_err();
        assert!(matches!(err, DataLoaderError::InvalidManifest { line: 1, .. }));
    }

    #[test]
    fn csv_ragged_row_reports_line() {
        let csv = "path,label\na.png,1\n\nb.png,2,extra\n";
        let err = ImageManifestDataset::from_csv_str(csv, ".", CsvManifestConfig::default())
            .unwrap_err();
        match err {
            DataLoaderError::InvalidManifest { line, .. } => assert_eq!(line, 4),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn csv_bad_continuous_label() {
        let config = CsvManifestConfig::default().continuous_labels(true);
        let err = ImageManifestDataset::from_csv_str("path,y\na.png,abc\n", ".", config)
            .unwrap_err();
        assert!(matches!(err, DataLoaderError::InvalidManifest { line: 2, .. }));
    }

    #[test]
    fn missing_directory() {
        let err = ImageManifestDataset::from_class_dirs(
            "/definitely/not/a/real/dir",
            ImageDirConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DataLoaderError::DirectoryNotFound(_)));
    }
}
