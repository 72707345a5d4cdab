use crate::dataset::error::DatasetError;
use async_compression::tokio::bufread::GzipDecoder;
use futures_util::TryStreamExt;
use log::{info, warn};
use polars::prelude::*;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::UNIX_EPOCH;
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt, BufReader};
use tokio::{fs, task};
use tokio_util::io::StreamReader;

/// Where a dataset lives: a local file or an `http(s)` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatasetLocator {
    Local(PathBuf),
    Remote(String),
}

impl DatasetLocator {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            DatasetLocator::Remote(trimmed.to_string())
        } else {
            DatasetLocator::Local(PathBuf::from(trimmed))
        }
    }

    /// Final path segment, without any URL query string.
    pub fn file_name(&self) -> String {
        match self {
            DatasetLocator::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            DatasetLocator::Remote(url) => {
                let without_query = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
                without_query
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            }
        }
    }

    /// File name with the format extension(s) stripped.
    pub fn stem(&self) -> String {
        let name = self.file_name();
        let lower = name.to_ascii_lowercase();
        for ext in [".csv.gz", ".parquet", ".csv", ".nc4", ".nc", ".h5"] {
            if lower.ends_with(ext) {
                return name[..name.len() - ext.len()].to_string();
            }
        }
        name
    }
}

impl fmt::Display for DatasetLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetLocator::Local(path) => write!(f, "{}", path.display()),
            DatasetLocator::Remote(url) => write!(f, "{}", url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Parquet,
    Csv,
    CsvGz,
    NetCdf,
}

impl DatasetFormat {
    pub fn detect(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".parquet") {
            Some(DatasetFormat::Parquet)
        } else if lower.ends_with(".csv.gz") {
            Some(DatasetFormat::CsvGz)
        } else if lower.ends_with(".csv") {
            Some(DatasetFormat::Csv)
        } else if lower.ends_with(".nc") || lower.ends_with(".nc4") || lower.ends_with(".h5") {
            Some(DatasetFormat::NetCdf)
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        match self {
            DatasetFormat::Parquet => "parquet",
            DatasetFormat::Csv => "csv",
            DatasetFormat::CsvGz => "csv.gz",
            DatasetFormat::NetCdf => "netcdf",
        }
    }
}

pub struct DatasetLoader {
    cache_dir: PathBuf,
    download_client: Client,
}

impl DatasetLoader {
    pub fn new(cache_dir: &Path) -> DatasetLoader {
        DatasetLoader {
            cache_dir: cache_dir.to_path_buf(),
            download_client: Client::new(),
        }
    }

    /// Resolves a locator to a `LazyFrame`.
    ///
    /// Local Parquet and CSV files are scanned in place. Remote files and gzipped CSV
    /// are materialised into a Parquet file in the cache directory. A local source that
    /// is rewritten gets a new cache entry.
    pub async fn get_frame(&self, locator: &DatasetLocator) -> Result<LazyFrame, DatasetError> {
        let format = DatasetFormat::detect(&locator.file_name())
            .ok_or_else(|| DatasetError::UnknownFormat(locator.to_string()))?;
        if format == DatasetFormat::NetCdf {
            return Err(DatasetError::UnsupportedFormat {
                locator: locator.to_string(),
                format: format.name().to_string(),
            });
        }

        match locator {
            DatasetLocator::Local(path) => {
                if fs::metadata(path).await.is_err() {
                    return Err(DatasetError::NotFound(path.clone()));
                }
                match format {
                    DatasetFormat::Parquet => Self::scan_parquet(path),
                    DatasetFormat::Csv => LazyCsvReader::new(path)
                        .with_has_header(true)
                        .with_try_parse_dates(true)
                        .finish()
                        .map_err(|e| DatasetError::Scan(path.clone(), e)),
                    _ => self.cached_frame(locator, format).await,
                }
            }
            DatasetLocator::Remote(_) => self.cached_frame(locator, format).await,
        }
    }

    /// Cache file for a locator: a SHA-256 prefix plus the readable stem.
    ///
    /// Local sources also hash their length and modification time.
    async fn cache_path(&self, locator: &DatasetLocator) -> Result<PathBuf, DatasetError> {
        let mut hasher = Sha256::new();
        match locator {
            DatasetLocator::Remote(url) => {
                hasher.update(b"remote:");
                hasher.update(url.as_bytes());
            }
            DatasetLocator::Local(path) => {
                let metadata = fs::metadata(path)
                    .await
                    .map_err(|_| DatasetError::NotFound(path.clone()))?;
                let modified = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_nanos())
                    .unwrap_or_default();
                hasher.update(b"local:");
                hasher.update(path.to_string_lossy().as_bytes());
                hasher.update(metadata.len().to_le_bytes());
                hasher.update(modified.to_le_bytes());
            }
        }
        let digest = hex::encode(hasher.finalize());
        Ok(self
            .cache_dir
            .join(format!("{}-{}.parquet", &digest[..16], locator.stem())))
    }

    async fn cached_frame(
        &self,
        locator: &DatasetLocator,
        format: DatasetFormat,
    ) -> Result<LazyFrame, DatasetError> {
        let parquet_path = self.cache_path(locator).await?;

        if fs::metadata(&parquet_path).await.is_ok() {
            info!("Cache hit for dataset {} at {:?}", locator, parquet_path);
        } else {
            warn!(
                "Cache miss for dataset {}. Fetching and converting to parquet.",
                locator
            );
            let raw_bytes = self.read_bytes(locator, format).await?;

            fs::create_dir_all(&self.cache_dir)
                .await
                .map_err(|e| DatasetError::CacheDirCreation(self.cache_dir.clone(), e))?;

            if format == DatasetFormat::Parquet {
                Self::cache_bytes(raw_bytes, &parquet_path).await?;
            } else {
                let df = Self::csv_to_dataframe(raw_bytes, &locator.to_string()).await?;
                Self::cache_dataframe(df, &parquet_path).await?;
            }
            info!("Cached dataset {} to {:?}", locator, parquet_path);
        }

        Self::scan_parquet(&parquet_path)
    }

    fn scan_parquet(path: &Path) -> Result<LazyFrame, DatasetError> {
        LazyFrame::scan_parquet(path, Default::default())
            .map_err(|e| DatasetError::Scan(path.to_path_buf(), e))
    }

    /// Reads the raw dataset bytes, gunzipping `.csv.gz` on the fly.
    async fn read_bytes(
        &self,
        locator: &DatasetLocator,
        format: DatasetFormat,
    ) -> Result<Vec<u8>, DatasetError> {
        let gzipped = format == DatasetFormat::CsvGz;
        let mut reader: Pin<Box<dyn AsyncRead + Send>> = match locator {
            DatasetLocator::Local(path) => {
                let file = fs::File::open(path)
                    .await
                    .map_err(|_| DatasetError::NotFound(path.clone()))?;
                let buffered = BufReader::new(file);
                if gzipped {
                    Box::pin(GzipDecoder::new(buffered))
                } else {
                    Box::pin(buffered)
                }
            }
            DatasetLocator::Remote(url) => {
                let stream_reader = self.download(url).await?;
                if gzipped {
                    Box::pin(GzipDecoder::new(stream_reader))
                } else {
                    Box::pin(stream_reader)
                }
            }
        };

        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        info!("Read {} bytes for dataset {}", bytes.len(), locator);
        Ok(bytes)
    }

    async fn download(
        &self,
        url: &str,
    ) -> Result<Pin<Box<dyn AsyncBufRead + Send>>, DatasetError> {
        info!("Downloading dataset from {}", url);

        let response = self
            .download_client
            .get(url)
            .send()
            .await
            .map_err(|e| DatasetError::NetworkRequest(url.to_string(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    DatasetError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    DatasetError::NetworkRequest(url.to_string(), e)
                });
            }
        };

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::pin(StreamReader::new(Box::pin(stream))))
    }

    /// Parses CSV bytes (with header row) into a DataFrame on a blocking task.
    async fn csv_to_dataframe(bytes: Vec<u8>, locator: &str) -> Result<DataFrame, DatasetError> {
        let locator_owned = locator.to_string();

        task::spawn_blocking(move || {
            let mut temp_file = NamedTempFile::new().map_err(|e| DatasetError::CsvReadIo {
                locator: locator_owned.clone(),
                source: e,
            })?;
            temp_file
                .write_all(&bytes)
                .and_then(|_| temp_file.flush())
                .map_err(|e| DatasetError::CsvReadIo {
                    locator: locator_owned.clone(),
                    source: e,
                })?;

            CsvReadOptions::default()
                .with_has_header(true)
                .map_parse_options(|opts| opts.with_try_parse_dates(true))
                .try_into_reader_with_file_path(Some(temp_file.path().to_path_buf()))
                .map_err(|e| DatasetError::CsvReadPolars {
                    locator: locator_owned.clone(),
                    source: e,
                })?
                .finish()
                .map_err(|e| DatasetError::CsvReadPolars {
                    locator: locator_owned,
                    source: e,
                })
        })
        .await?
    }

    /// Writes into a temporary file next to `path` and renames it into place, so an
    /// interrupted write never leaves a partial cache entry behind.
    fn persist_atomically<F>(path: &Path, write: F) -> Result<(), DatasetError>
    where
        F: FnOnce(&mut NamedTempFile) -> Result<(), DatasetError>,
    {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(dir)
            .map_err(|e| DatasetError::ParquetWriteIo(path.to_path_buf(), e))?;
        write(&mut temp_file)?;
        temp_file
            .persist(path)
            .map_err(|e| DatasetError::ParquetWriteIo(path.to_path_buf(), e.error))?;
        Ok(())
    }

    async fn cache_bytes(bytes: Vec<u8>, path: &Path) -> Result<(), DatasetError> {
        let path_buf = path.to_path_buf();
        task::spawn_blocking(move || {
            Self::persist_atomically(&path_buf, |file| {
                file.write_all(&bytes)
                    .and_then(|_| file.flush())
                    .map_err(|e| DatasetError::ParquetWriteIo(path_buf.clone(), e))
            })
        })
        .await?
    }

    async fn cache_dataframe(mut df: DataFrame, path: &Path) -> Result<(), DatasetError> {
        let path_buf = path.to_path_buf();
        task::spawn_blocking(move || {
            Self::persist_atomically(&path_buf, |file| {
                ParquetWriter::new(file)
                    .with_compression(ParquetCompression::Snappy)
                    .finish(&mut df)
                    .map_err(|e| DatasetError::ParquetWritePolars(path_buf.clone(), e))?;
                Ok(())
            })
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::write::GzipEncoder;
    use tokio::io::AsyncWriteExt;

    const CSV: &str = "time,lat,lon,T2MMAX\n\
        2020-03-15,39.5,-105.0,300.15\n\
        2021-03-15,39.5,-105.0,301.15\n";

    #[test]
    fn test_locator_parsing_and_names() {
        let remote = DatasetLocator::parse("https://example.org/data/merra2.csv.gz?token=x");
        assert!(matches!(remote, DatasetLocator::Remote(_)));
        assert_eq!(remote.file_name(), "merra2.csv.gz");
        assert_eq!(remote.stem(), "merra2");

        let local = DatasetLocator::parse(" /srv/climate/denver.parquet ");
        assert_eq!(local, DatasetLocator::Local(PathBuf::from("/srv/climate/denver.parquet")));
        assert_eq!(local.stem(), "denver");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(DatasetFormat::detect("a.PARQUET"), Some(DatasetFormat::Parquet));
        assert_eq!(DatasetFormat::detect("a.csv"), Some(DatasetFormat::Csv));
        assert_eq!(DatasetFormat::detect("a.csv.gz"), Some(DatasetFormat::CsvGz));
        assert_eq!(DatasetFormat::detect("merra2.nc4"), Some(DatasetFormat::NetCdf));
        assert_eq!(DatasetFormat::detect("notes.txt"), None);
    }

    #[tokio::test]
    async fn test_missing_local_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(tmp.path());
        let locator = DatasetLocator::Local(tmp.path().join("absent.parquet"));
        let result = loader.get_frame(&locator).await;
        assert!(matches!(result, Err(DatasetError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_netcdf_is_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(tmp.path());
        let locator = DatasetLocator::parse("/data/merra2_sample.nc");
        let result = loader.get_frame(&locator).await;
        assert!(matches!(result, Err(DatasetError::UnsupportedFormat { .. })));
    }

    #[tokio::test]
    async fn test_local_csv_scans_with_parsed_dates() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("denver.csv");
        std::fs::write(&path, CSV)?;

        let loader = DatasetLoader::new(tmp.path());
        let df = loader
            .get_frame(&DatasetLocator::Local(path))
            .await?
            .collect()?;
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("time")?.dtype(), &DataType::Date);
        Ok(())
    }

    async fn write_gzipped(path: &Path, csv: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut encoder = GzipEncoder::new(Vec::new());
        encoder.write_all(csv.as_bytes()).await?;
        encoder.shutdown().await?;
        std::fs::write(path, encoder.into_inner())?;
        Ok(())
    }

    fn cache_entries(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok().map(|e| e.path()))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_gzipped_csv_is_cached_as_parquet() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("denver.csv.gz");
        write_gzipped(&path, CSV).await?;

        let cache_dir = tmp.path().join("cache");
        let loader = DatasetLoader::new(&cache_dir);
        let locator = DatasetLocator::Local(path);
        let df = loader.get_frame(&locator).await?.collect()?;
        assert_eq!(df.height(), 2);
        let cached = loader.cache_path(&locator).await?;
        assert!(cached.exists());
        // Only the finished parquet file is left in the cache directory.
        assert_eq!(cache_entries(&cache_dir), vec![cached]);

        // Second load is served from the parquet cache.
        let again = loader.get_frame(&locator).await?.collect()?;
        assert_eq!(again.height(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_rewritten_gzipped_csv_is_reloaded() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("denver.csv.gz");
        let cache_dir = tmp.path().join("cache");
        let locator = DatasetLocator::Local(path.clone());

        write_gzipped(&path, "time,lat,lon,T2MMAX\n2020-03-15,39.5,-105.0,300.15\n").await?;
        let first = DatasetLoader::new(&cache_dir).get_frame(&locator).await?.collect()?;
        assert_eq!(first.height(), 1);

        write_gzipped(
            &path,
            "time,lat,lon,T2MMAX\n\
             2020-03-15,39.5,-105.0,300.15\n\
             2021-03-15,39.5,-105.0,301.15\n\
             2022-03-15,39.5,-105.0,302.15\n",
        )
        .await?;
        // A fresh loader on the same cache directory, as after a restart.
        let second = DatasetLoader::new(&cache_dir).get_frame(&locator).await?.collect()?;
        assert_eq!(second.height(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_cache_key_is_stable_for_unchanged_source() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("denver.csv.gz");
        write_gzipped(&path, CSV).await?;
        let locator = DatasetLocator::Local(path);

        let a = DatasetLoader::new(tmp.path()).cache_path(&locator).await?;
        let b = DatasetLoader::new(tmp.path()).cache_path(&locator).await?;
        assert_eq!(a, b);
        let name = a.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert!(name.ends_with("-denver.parquet"), "got {}", name);
        assert_eq!(name.len(), 16 + "-denver.parquet".len());

        let remote = DatasetLocator::parse("https://example.org/data/denver.csv.gz");
        let r = DatasetLoader::new(tmp.path()).cache_path(&remote).await?;
        assert_ne!(a, r);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_conversion_leaves_no_cache_entry() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("broken.csv.gz");
        std::fs::write(&path, b"not gzip at all")?;

        let cache_dir = tmp.path().join("cache");
        let loader = DatasetLoader::new(&cache_dir);
        let locator = DatasetLocator::Local(path);
        assert!(loader.get_frame(&locator).await.is_err());
        assert!(!loader.cache_path(&locator).await?.exists());
        assert!(cache_entries(&cache_dir).is_empty());
        Ok(())
    }
}
