use crate::data::{Cell, UploadedExpressionMatrix};
use crate::error::{PrepError, Result};
use csv::{ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    Tsv,
    GzippedCsv,
    GzippedTsv,
}

impl FileFormat {
    /// Detect file format from path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        let stem = path.file_stem().and_then(|s| s.to_str());

        match (ext.as_deref(), stem) {
            (Some("gz"), Some(stem)) => {
                let stem = stem.to_lowercase();
                if stem.ends_with(".csv") {
                    Ok(FileFormat::GzippedCsv)
                } else if stem.ends_with(".tsv") || stem.ends_with(".txt") {
                    Ok(FileFormat::GzippedTsv)
                } else {
                    Err(PrepError::Malformed(format!(
                        "cannot determine format of gzipped file {:?}",
                        path
                    )))
                }
            }
            (Some("csv"), _) => Ok(FileFormat::Csv),
            (Some("tsv"), _) | (Some("txt"), _) => Ok(FileFormat::Tsv),
            _ => Err(PrepError::Malformed(format!(
                "unsupported file format: {:?}",
                path
            ))),
        }
    }

    /// Get delimiter character
    pub fn delimiter(&self) -> u8 {
        match self {
            FileFormat::Csv | FileFormat::GzippedCsv => b',',
            FileFormat::Tsv | FileFormat::GzippedTsv => b'\t',
        }
    }

    /// Check if format is gzipped
    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::GzippedCsv | FileFormat::GzippedTsv)
    }
}

/// Open a possibly gzipped file for reading
pub fn open_reader<P: AsRef<Path>>(path: P, format: FileFormat) -> Result<Box<dyn Read>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
    if format.is_gzipped() {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// A delimited table read with its header row
#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<StringRecord>,
}

impl Table {
    /// Column position by header name
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Column position by header name, failing with a description of the table
    pub fn require_column(&self, name: &str, table: &str) -> Result<usize> {
        self.column(name).ok_or_else(|| {
            PrepError::Malformed(format!("{} is missing required column '{}'", table, name))
        })
    }
}

/// Parse a delimited table with a header row
pub fn parse_table<R: Read>(reader: R, delimiter: u8) -> Result<Table> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()?
        .iter()
        .map(|s| s.trim().to_string())
        .collect::<Vec<_>>();

    let records = csv_reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Table { headers, records })
}

/// Read a delimited table from disk, format detected from the extension
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let format = FileFormat::from_path(path)?;
    debug!("Reading {:?} as {:?}", path, format);
    parse_table(open_reader(path, format)?, format.delimiter())
}

/// Loader configuration for uploaded matrices
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Maximum number of gene rows to load (0 = unlimited)
    pub max_records: usize,
    /// Log progress every this many rows
    pub batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_records: 0,
            batch_size: 10000,
        }
    }
}

/// Loader for uploaded expression matrices.
///
/// The first column is the gene-key column whatever its header says; every
/// remaining column is a sample.
pub struct MatrixLoader {
    config: LoaderConfig,
}

impl MatrixLoader {
    /// Create new loader with default config
    pub fn new() -> Self {
        Self {
            config: LoaderConfig::default(),
        }
    }

    /// Create new loader with custom config
    pub fn with_config(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Load an uploaded matrix from file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<UploadedExpressionMatrix> {
        let path = path.as_ref();
        info!("Loading expression matrix from {:?}", path);

        let format = FileFormat::from_path(path)?;
        debug!("Detected file format: {:?}", format);

        let matrix = self.parse_matrix(open_reader(path, format)?, format)?;
        info!(
            "Loaded {} genes x {} samples",
            matrix.n_genes(),
            matrix.n_samples()
        );
        Ok(matrix)
    }

    /// Parse a matrix from any reader
    pub fn parse_matrix<R: Read>(
        &self,
        reader: R,
        format: FileFormat,
    ) -> Result<UploadedExpressionMatrix> {
        let table = parse_table(reader, format.delimiter())?;
        if table.headers.is_empty() {
            return Err(PrepError::Malformed("expression matrix has no header".into()));
        }

        debug!("Gene column header: {:?}", table.headers[0]);
        let samples = table.headers[1..].to_vec();
        if samples.is_empty() {
            warn!("Expression matrix has no sample columns");
        }

        let mut matrix = UploadedExpressionMatrix::new(samples);
        for (line, record) in table.records.iter().enumerate() {
            let gene = record.get(0).unwrap_or("").trim();
            if gene.is_empty() {
                warn!("Skipping row at line {} with empty gene identifier", line + 2);
                continue;
            }

            let cells = (1..table.headers.len())
                .map(|i| Cell::parse(record.get(i).unwrap_or("")))
                .collect();
            matrix.push_row(gene, cells)?;

            if self.config.max_records > 0 && matrix.n_genes() >= self.config.max_records {
                warn!("Reached maximum record limit: {}", self.config.max_records);
                break;
            }

            if matrix.n_genes() % self.config.batch_size == 0 {
                debug!("Loaded {} rows...", matrix.n_genes());
            }
        }

        Ok(matrix)
    }
}

impl Default for MatrixLoader {
    fn default() -> Self {
        Self::new()
    }
}
