//! 插件包验证器
//!
//! 在写入任何文件之前验证插件包：
//! - 扩展名是否为受支持的压缩格式
//! - 文件魔数与压缩包结构完整性
//! - 包内清单文件的存在性与有效性

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::types::{InstallError, PackageFormat};
use crate::types::{PluginManifest, MANIFEST_FILE};

/// 包验证器
pub struct PackageValidator;

impl PackageValidator {
    pub fn new() -> Self {
        Self
    }

    /// 验证包格式
    ///
    /// 不支持的扩展名返回 UnsupportedFormat，此时安装是无副作用的空操作
    pub fn validate_format(&self, path: &Path) -> Result<PackageFormat, InstallError> {
        if !path.is_file() {
            return Err(InstallError::InvalidPackage(format!(
                "文件不存在: {}",
                path.display()
            )));
        }

        let format = PackageFormat::from_extension(path)
            .ok_or_else(|| InstallError::UnsupportedFormat(path.display().to_string()))?;

        let metadata = std::fs::metadata(path)?;
        if metadata.len() == 0 {
            return Err(InstallError::InvalidPackage("文件为空".to_string()));
        }

        self.validate_magic_bytes(path, format)?;
        self.validate_archive_integrity(path, format)?;

        Ok(format)
    }

    /// 验证文件魔数
    fn validate_magic_bytes(&self, path: &Path, format: PackageFormat) -> Result<(), InstallError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut magic = [0u8; 2];

        reader
            .read_exact(&mut magic)
            .map_err(|e| InstallError::InvalidPackage(format!("无法读取文件头: {}", e)))?;

        match format {
            // ZIP 文件魔数: PK
            PackageFormat::Zip if magic != [0x50, 0x4B] => Err(InstallError::InvalidPackage(
                "无效的 ZIP 文件格式".to_string(),
            )),
            // Gzip 文件魔数: \x1f\x8b
            PackageFormat::TarGz if magic != [0x1f, 0x8b] => Err(InstallError::InvalidPackage(
                "无效的 tar.gz 文件格式".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// 验证压缩包完整性
    ///
    /// 遍历压缩包结构，确保文件未损坏且非空
    fn validate_archive_integrity(
        &self,
        path: &Path,
        format: PackageFormat,
    ) -> Result<(), InstallError> {
        match format {
            PackageFormat::Zip => {
                let file = File::open(path)?;
                let mut archive = zip::ZipArchive::new(file).map_err(|e| {
                    InstallError::InvalidPackage(format!("无法读取 ZIP 文件: {}", e))
                })?;

                if archive.len() == 0 {
                    return Err(InstallError::InvalidPackage("ZIP 压缩包为空".to_string()));
                }

                for i in 0..archive.len() {
                    archive.by_index(i).map_err(|e| {
                        InstallError::InvalidPackage(format!(
                            "ZIP 文件损坏，无法读取条目 {}: {}",
                            i, e
                        ))
                    })?;
                }
            }
            PackageFormat::TarGz => {
                let file = File::open(path)?;
                let gz = flate2::read::GzDecoder::new(file);
                let mut archive = tar::Archive::new(gz);

                let mut entry_count = 0;
                for entry in archive.entries().map_err(|e| {
                    InstallError::InvalidPackage(format!("无法读取 tar.gz 文件: {}", e))
                })? {
                    entry.map_err(|e| {
                        InstallError::InvalidPackage(format!("tar.gz 文件损坏: {}", e))
                    })?;
                    entry_count += 1;
                }

                if entry_count == 0 {
                    return Err(InstallError::InvalidPackage(
                        "tar.gz 压缩包为空".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// 从压缩包中提取并验证清单
    ///
    /// 清单缺失或无效时安装被拒绝，不会留下半成品插件目录
    pub fn extract_and_validate_manifest(
        &self,
        path: &Path,
        format: PackageFormat,
    ) -> Result<PluginManifest, InstallError> {
        let content = match format {
            PackageFormat::Zip => self.read_manifest_from_zip(path)?,
            PackageFormat::TarGz => self.read_manifest_from_targz(path)?,
        };

        let manifest: PluginManifest = serde_json::from_str(&content).map_err(|e| {
            InstallError::InvalidManifest(format!("{} 解析失败: {}", MANIFEST_FILE, e))
        })?;

        manifest
            .validate()
            .map_err(|e| InstallError::InvalidManifest(e.to_string()))?;

        Ok(manifest)
    }

    /// 从 ZIP 中读取清单内容
    ///
    /// 清单可能在根目录或一层子目录中
    fn read_manifest_from_zip(&self, path: &Path) -> Result<String, InstallError> {
        let file = File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| InstallError::InvalidPackage(format!("无法读取 ZIP 文件: {}", e)))?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| InstallError::InvalidPackage(format!("无法读取 ZIP 条目: {}", e)))?;

            let name = entry.name().to_string();
            if name.ends_with(MANIFEST_FILE) && !name.contains("__MACOSX") {
                let mut content = String::new();
                entry.read_to_string(&mut content).map_err(|e| {
                    InstallError::InvalidManifest(format!("无法读取 {}: {}", MANIFEST_FILE, e))
                })?;
                return Ok(content);
            }
        }

        Err(InstallError::InvalidPackage(format!(
            "压缩包中未找到 {}",
            MANIFEST_FILE
        )))
    }

    /// 从 tar.gz 中读取清单内容
    fn read_manifest_from_targz(&self, path: &Path) -> Result<String, InstallError> {
        let file = File::open(path)?;
        let gz = flate2::read::GzDecoder::new(file);
        let mut archive = tar::Archive::new(gz);

        for entry in archive
            .entries()
            .map_err(|e| InstallError::InvalidPackage(format!("无法读取 tar.gz 文件: {}", e)))?
        {
            let mut entry = entry
                .map_err(|e| InstallError::InvalidPackage(format!("tar.gz 条目读取失败: {}", e)))?;

            let entry_path = entry
                .path()
                .map_err(|e| InstallError::InvalidPackage(format!("tar.gz 条目路径无效: {}", e)))?
                .into_owned();

            if entry_path.ends_with(MANIFEST_FILE) {
                let mut content = String::new();
                entry.read_to_string(&mut content).map_err(|e| {
                    InstallError::InvalidManifest(format!("无法读取 {}: {}", MANIFEST_FILE, e))
                })?;
                return Ok(content);
            }
        }

        Err(InstallError::InvalidPackage(format!(
            "压缩包中未找到 {}",
            MANIFEST_FILE
        )))
    }
}

impl Default for PackageValidator {
    fn default() -> Self {
        Self::new()
    }
}
