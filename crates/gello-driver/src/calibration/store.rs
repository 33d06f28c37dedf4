//! 标定记录存储
//!
//! 文件路径由设备标识的文件名部分决定：
//!
//! ```text
//! /dev/serial/by-id/usb-FTDI_..._FT94ER3L-if00-port0
//!     -> {directory}/usb-FTDI_..._FT94ER3L-if00-port0.json
//! ```
//!
//! 存储即覆盖，没有合并与版本管理。

use super::{CalibrationError, CalibrationRecord, RawCalibrationRecord};
use std::fs;
use std::path::{Path, PathBuf};

/// 存储配置（显式注入，不使用全局默认路径）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationStoreConfig {
    /// 标定文件所在目录
    pub directory: PathBuf,
}

impl CalibrationStoreConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// 默认目录
    ///
    /// - Linux: `~/.config/gello/calibration`
    /// - macOS: `~/Library/Application Support/gello/calibration`
    /// - 无法确定配置目录时：`./configurations`
    pub fn default_directory() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("gello").join("calibration"))
            .unwrap_or_else(|| PathBuf::from("configurations"))
    }
}

impl Default for CalibrationStoreConfig {
    fn default() -> Self {
        Self::new(Self::default_directory())
    }
}

/// 以设备标识为键的标定存储
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    config: CalibrationStoreConfig,
}

impl CalibrationStore {
    pub fn new(config: CalibrationStoreConfig) -> Self {
        Self { config }
    }

    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    /// 设备标识对应的文件路径
    pub fn path_for(&self, identifier: &str) -> Result<PathBuf, CalibrationError> {
        let name = Path::new(identifier).file_name().ok_or_else(|| {
            CalibrationError::ConfigValidation(format!(
                "device identifier '{}' has no base name",
                identifier
            ))
        })?;

        let mut file_name = name.to_os_string();
        file_name.push(".json");
        Ok(self.config.directory.join(file_name))
    }

    /// 是否已有该设备的标定
    pub fn contains(&self, identifier: &str) -> bool {
        self.path_for(identifier)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// 保存标定记录（覆盖已有记录）
    pub fn store(
        &self,
        record: &CalibrationRecord,
        identifier: &str,
    ) -> Result<PathBuf, CalibrationError> {
        let path = self.path_for(identifier)?;

        fs::create_dir_all(&self.config.directory).map_err(|source| CalibrationError::Io {
            path: self.config.directory.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(record).map_err(|source| {
            CalibrationError::Parse {
                path: path.clone(),
                source,
            }
        })?;

        fs::write(&path, json).map_err(|source| CalibrationError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!(identifier, path = %path.display(), "Stored calibration");
        Ok(path)
    }

    /// 加载标定记录
    ///
    /// # 错误
    /// - `NotFound`: 该设备没有记录
    /// - `Parse`: 文件不是合法 JSON 或字段缺失
    /// - `ConfigValidation`: 记录违反长度/取值约束
    pub fn load(&self, identifier: &str) -> Result<CalibrationRecord, CalibrationError> {
        let path = self.path_for(identifier)?;

        if !path.is_file() {
            return Err(CalibrationError::NotFound {
                identifier: identifier.to_string(),
                path,
            });
        }

        let content = fs::read_to_string(&path).map_err(|source| CalibrationError::Io {
            path: path.clone(),
            source,
        })?;

        // 先解析原始形态，再单独校验，使约束错误不被包装成解析错误
        let raw: RawCalibrationRecord =
            serde_json::from_str(&content).map_err(|source| CalibrationError::Parse {
                path: path.clone(),
                source,
            })?;
        let record = CalibrationRecord::try_from(raw)?;

        tracing::debug!(identifier, path = %path.display(), "Loaded calibration");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::GripperConfig;
    use proptest::prelude::*;
    use std::f64::consts::FRAC_PI_2;
    use tempfile::TempDir;

    const PORT: &str = "/dev/serial/by-id/usb-FTDI_USB__-__Serial_Converter_TEST-if00-port0";

    fn store_in(dir: &TempDir) -> CalibrationStore {
        CalibrationStore::new(CalibrationStoreConfig::new(dir.path().join("configurations")))
    }

    fn sample_record() -> CalibrationRecord {
        CalibrationRecord::new(
            vec![1, 2, 3, 4, 5, 6, 7],
            vec![4.595, 3.124, 4.550, 1.323, 3.336, 1.147, 5.165],
            vec![1, -1, 1, -1, 1, 1, 1],
            GripperConfig::new(8, 198.0, 148.0),
        )
        .unwrap()
    }

    #[test]
    fn test_path_uses_base_name() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let path = store.path_for(PORT).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "usb-FTDI_USB__-__Serial_Converter_TEST-if00-port0.json"
        );
        assert_eq!(path.parent().unwrap(), store.directory());
    }

    #[test]
    fn test_identifier_without_base_name() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(
            store.path_for("/"),
            Err(CalibrationError::ConfigValidation(_))
        ));
    }

    #[test]
    fn test_store_creates_directory_and_loads() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(!store.directory().exists());

        let record = sample_record();
        let path = store.store(&record, PORT).unwrap();
        assert!(path.is_file());
        assert!(store.contains(PORT));

        assert_eq!(store.load(PORT).unwrap(), record);
    }

    #[test]
    fn test_store_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.store(&sample_record(), PORT).unwrap();

        let replacement = CalibrationRecord::new(
            vec![1, 2],
            vec![0.0, FRAC_PI_2],
            vec![1, -1],
            GripperConfig::new(3, 10.0, 60.0),
        )
        .unwrap();
        store.store(&replacement, PORT).unwrap();
        assert_eq!(store.load(PORT).unwrap(), replacement);
    }

    #[test]
    fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        match store.load("/dev/ttyUSB42") {
            Err(CalibrationError::NotFound { identifier, path }) => {
                assert_eq!(identifier, "/dev/ttyUSB42");
                assert!(path.ends_with("ttyUSB42.json"));
            },
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_load_invalid_lengths() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.directory()).unwrap();
        fs::write(
            store.path_for(PORT).unwrap(),
            r#"{"joint_ids": [1, 2], "joint_offsets": [0.0], "joint_signs": [1, 1], "gripper_config": [3, 10, 60]}"#,
        )
        .unwrap();

        assert!(matches!(
            store.load(PORT),
            Err(CalibrationError::ConfigValidation(_))
        ));
    }

    #[test]
    fn test_load_malformed() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.directory()).unwrap();
        fs::write(store.path_for(PORT).unwrap(), "{ not json").unwrap();

        assert!(matches!(
            store.load(PORT),
            Err(CalibrationError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_reads_integer_gripper_angles() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.directory()).unwrap();
        fs::write(
            store.path_for(PORT).unwrap(),
            r#"{
    "joint_ids": [1, 2, 3, 4, 5, 6, 7],
    "joint_offsets": [4.595, 3.124, 4.55, 1.323, 3.336, 1.147, 5.165],
    "joint_signs": [1, -1, 1, -1, 1, 1, 1],
    "gripper_config": [8, 198, 148]
}"#,
        )
        .unwrap();

        assert_eq!(store.load(PORT).unwrap(), sample_record());
    }

    fn record_strategy() -> impl Strategy<Value = CalibrationRecord> {
        (1usize..8).prop_flat_map(|n| {
            (
                proptest::collection::vec(-4i32..4, n),
                proptest::collection::vec(prop_oneof![Just(1i8), Just(-1i8)], n),
                proptest::collection::vec(-0.5f64..0.5, n),
                0.0f64..180.0,
                1.0f64..90.0,
            )
                .prop_map(move |(turns, signs, jitter, open, travel)| {
                    let offsets = turns
                        .iter()
                        .zip(&jitter)
                        .map(|(k, j)| *k as f64 * FRAC_PI_2 + j)
                        .collect();
                    CalibrationRecord::new(
                        (1..=n as u32).collect(),
                        offsets,
                        signs,
                        GripperConfig::new(n as u32 + 1, open, open - travel),
                    )
                    .unwrap()
                })
        })
    }

    proptest! {
        #[test]
        fn prop_store_load_roundtrip(record in record_strategy()) {
            let dir = TempDir::new().unwrap();
            let store = store_in(&dir);
            store.store(&record, PORT).unwrap();
            prop_assert_eq!(store.load(PORT).unwrap(), record);
        }
    }
}
