//! 插件安装器核心实现
//!
//! 安装流程: 验证 → 暂存目录解压 → 原子重命名进入插件根目录。
//! 中途失败只会留下随即被清理的暂存目录，不会出现看似可用的半成品插件。
//! 卸载把插件目录移入系统回收站，用户可以手动恢复。

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::types::{
    InstallError, InstallProgress, NoopProgressCallback, PackageFormat, ProgressCallback,
    UninstallError,
};
use super::validator::PackageValidator;
use crate::registry::PluginRegistry;
use crate::types::{is_safe_name, PluginManifest, MANIFEST_FILE};

/// 插件根目录写操作的全局锁
///
/// 安装与卸载共享同一个可变资源（插件根目录），按次序串行执行
static ROOT_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// 插件安装器
pub struct PluginInstaller {
    plugins_root: PathBuf,
    validator: PackageValidator,
}

impl PluginInstaller {
    pub fn new(plugins_root: PathBuf) -> Self {
        Self {
            plugins_root,
            validator: PackageValidator::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PluginRegistry::default_plugins_root())
    }

    /// 从本地压缩包安装插件，不汇报进度
    pub fn install(&self, path: &Path) -> Result<PluginManifest, InstallError> {
        self.install_from_file(path, &NoopProgressCallback)
    }

    /// 从本地压缩包安装插件
    ///
    /// 目标目录名取压缩包的基本文件名（去扩展名）。
    /// 同名目录已存在时拒绝安装，既有插件不会被覆盖或合并。
    /// 安装只写文件系统，调用方需要重新扫描注册表才能看到新插件。
    pub fn install_from_file(
        &self,
        path: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<PluginManifest, InstallError> {
        let _guard = ROOT_LOCK.lock();

        progress.on_progress(InstallProgress::validating("验证包格式..."));
        let format = self.validator.validate_format(path)?;

        progress.on_progress(InstallProgress::validating("验证清单文件..."));
        let manifest = self.validator.extract_and_validate_manifest(path, format)?;

        let dir_name = archive_stem(path, format)?;
        let dest_dir = self.plugins_root.join(&dir_name);
        if dest_dir.exists() {
            return Err(InstallError::AlreadyExists(dir_name));
        }

        if manifest.name != dir_name {
            tracing::warn!(
                "压缩包名与清单名不一致: {} != {}，目录将以压缩包名命名",
                dir_name,
                manifest.name
            );
        }

        fs::create_dir_all(&self.plugins_root)?;

        // 暂存目录建在插件根目录内，保证最后的 rename 不跨文件系统
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.plugins_root)?;

        progress.on_progress(InstallProgress::extracting(0, "解压插件包..."));
        match format {
            PackageFormat::Zip => self.extract_zip(path, staging.path(), progress)?,
            PackageFormat::TarGz => self.extract_targz(path, staging.path(), progress)?,
        }

        let plugin_root = find_plugin_root(staging.path())?;

        progress.on_progress(InstallProgress::installing(90, "安装插件文件..."));
        fs::rename(&plugin_root, &dest_dir)?;

        progress.on_progress(InstallProgress::complete(format!(
            "插件 {} {} 安装成功",
            manifest.name,
            manifest.display_version()
        )));

        tracing::info!("已安装插件 {} 到 {}", manifest.name, dest_dir.display());
        Ok(manifest)
    }

    /// 卸载插件
    ///
    /// 目录移入回收站而不是永久删除。目录已不存在（例如被外部手动删除）
    /// 时返回 NotFound，调用方可以据此给出明确提示。
    /// 卸载不触发重新扫描，调用方需要自行同步内存中的列表。
    pub fn uninstall(&self, plugin_name: &str) -> Result<(), UninstallError> {
        let _guard = ROOT_LOCK.lock();

        // 不安全的名称不可能对应真实的插件目录
        if !is_safe_name(plugin_name) {
            return Err(UninstallError::NotFound(plugin_name.to_string()));
        }

        let plugin_dir = self.plugins_root.join(plugin_name);
        if !plugin_dir.is_dir() {
            return Err(UninstallError::NotFound(plugin_name.to_string()));
        }

        trash::delete(&plugin_dir).map_err(|e| UninstallError::DeletionFailed(e.to_string()))?;

        tracing::info!("已卸载插件 {}，目录移入回收站", plugin_name);
        Ok(())
    }

    /// 解压 ZIP 文件
    fn extract_zip(
        &self,
        path: &Path,
        dest: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<(), InstallError> {
        let file = File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| InstallError::ExtractFailed(format!("无法读取 ZIP 文件: {}", e)))?;

        let total = archive.len();
        for i in 0..total {
            let mut entry = archive.by_index(i).map_err(|e| {
                InstallError::ExtractFailed(format!("无法读取 ZIP 条目 {}: {}", i, e))
            })?;

            // enclosed_name 拒绝越出目标目录的路径
            let outpath = match entry.enclosed_name() {
                Some(path) => dest.join(path),
                None => continue,
            };

            // 跳过 macOS 元数据
            if outpath.to_string_lossy().contains("__MACOSX") {
                continue;
            }

            if entry.name().ends_with('/') {
                fs::create_dir_all(&outpath)?;
            } else {
                if let Some(parent) = outpath.parent() {
                    if !parent.exists() {
                        fs::create_dir_all(parent)?;
                    }
                }
                let mut outfile = File::create(&outpath)?;
                std::io::copy(&mut entry, &mut outfile)
                    .map_err(|e| InstallError::ExtractFailed(format!("写入文件失败: {}", e)))?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    if let Some(mode) = entry.unix_mode() {
                        fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
                    }
                }
            }

            let percent = ((i + 1) as f64 / total as f64 * 100.0) as u8;
            progress.on_progress(InstallProgress::extracting(
                percent,
                format!("解压中 ({}/{})", i + 1, total),
            ));
        }

        Ok(())
    }

    /// 解压 tar.gz 文件
    fn extract_targz(
        &self,
        path: &Path,
        dest: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<(), InstallError> {
        let file = File::open(path)?;
        let gz = flate2::read::GzDecoder::new(file);
        let mut archive = tar::Archive::new(gz);

        let mut count = 0;
        for entry in archive
            .entries()
            .map_err(|e| InstallError::ExtractFailed(format!("无法读取 tar.gz: {}", e)))?
        {
            let mut entry = entry
                .map_err(|e| InstallError::ExtractFailed(format!("tar.gz 条目读取失败: {}", e)))?;

            // unpack_in 拒绝越出目标目录的路径
            entry
                .unpack_in(dest)
                .map_err(|e| InstallError::ExtractFailed(format!("解压失败: {}", e)))?;

            count += 1;
            progress.on_progress(InstallProgress::extracting(
                0,
                format!("解压中 ({} 个条目)", count),
            ));
        }

        Ok(())
    }

    pub fn plugins_root(&self) -> &Path {
        &self.plugins_root
    }

    pub fn validator(&self) -> &PackageValidator {
        &self.validator
    }
}

/// 压缩包的基本文件名（去扩展名），作为安装目录名
fn archive_stem(path: &Path, format: PackageFormat) -> Result<String, InstallError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| InstallError::InvalidPackage("无效的文件名".to_string()))?;

    let stem = match format {
        PackageFormat::Zip => file_name.strip_suffix(".zip"),
        PackageFormat::TarGz => file_name
            .strip_suffix(".tar.gz")
            .or_else(|| file_name.strip_suffix(".tgz")),
    }
    .unwrap_or(file_name);

    if stem.is_empty() {
        return Err(InstallError::InvalidPackage("无效的文件名".to_string()));
    }
    Ok(stem.to_string())
}

/// 查找包含清单文件的插件根目录
///
/// 清单可能在解压根目录，也可能在压缩包自带的一层子目录中
fn find_plugin_root(extract_dir: &Path) -> Result<PathBuf, InstallError> {
    if extract_dir.join(MANIFEST_FILE).exists() {
        return Ok(extract_dir.to_path_buf());
    }

    for entry in fs::read_dir(extract_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() && path.join(MANIFEST_FILE).exists() {
            return Ok(path);
        }
    }

    Err(InstallError::InvalidPackage(format!(
        "未找到 {}",
        MANIFEST_FILE
    )))
}
