//! 插件注册表
//!
//! 扫描插件根目录，把每个子目录的清单解析成 PluginManifest。
//! 扫描即事实来源：不持有缓存，每次调用全量重建，
//! 外部对磁盘的修改（手动删除、手动拷贝）在下一次扫描立即可见。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{PluginError, PluginManifest, MANIFEST_FILE};

/// 判定插件是否被禁用的过滤钩子
///
/// 核心不持久化启用状态，判定逻辑由宿主注入
pub type DisabledFilter = Box<dyn Fn(&PluginManifest) -> bool + Send + Sync>;

pub struct PluginRegistry {
    plugins_root: PathBuf,
    disabled_filter: Option<DisabledFilter>,
}

impl PluginRegistry {
    pub fn new(plugins_root: PathBuf) -> Self {
        Self {
            plugins_root,
            disabled_filter: None,
        }
    }

    /// 默认插件根目录: ~/.config/quickview/plugins
    pub fn default_plugins_root() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quickview")
            .join("plugins")
    }

    pub fn with_defaults() -> Self {
        Self::new(Self::default_plugins_root())
    }

    /// 安装宿主提供的禁用过滤钩子
    pub fn set_disabled_filter(
        &mut self,
        filter: impl Fn(&PluginManifest) -> bool + Send + Sync + 'static,
    ) {
        self.disabled_filter = Some(Box::new(filter));
    }

    /// 列出候选插件目录
    ///
    /// 根目录不存在或不可读按无插件处理，返回空列表。
    /// 顺序为目录枚举顺序，只在单次扫描内稳定。
    pub fn scan_dirs(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.plugins_root) else {
            return Vec::new();
        };

        let mut dirs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            // 点前缀目录不是插件（安装过程中的暂存目录以 . 开头）
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            dirs.push(path);
        }
        dirs
    }

    /// 解析单个插件目录的清单
    pub fn load_manifest(&self, plugin_dir: &Path) -> Result<PluginManifest, PluginError> {
        let manifest_path = plugin_dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&manifest_path)
            .map_err(|e| PluginError::LoadError(format!("无法读取清单文件: {}", e)))?;
        let manifest: PluginManifest = serde_json::from_str(&content)
            .map_err(|e| PluginError::InvalidManifest(format!("解析失败: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// 全量扫描已安装插件
    ///
    /// 单个插件的清单缺失或损坏只会跳过该插件，不会中断整次扫描。
    /// 同一次扫描内重复的插件名称保留先出现的一个。
    pub fn plugins(&self, include_disabled: bool) -> Vec<PluginManifest> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut plugins = Vec::new();

        for dir in self.scan_dirs() {
            let manifest = match self.load_manifest(&dir) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("跳过插件 {}: {}", dir.display(), e);
                    continue;
                }
            };

            if !seen.insert(manifest.name.clone()) {
                tracing::warn!("插件名称重复，跳过 {}: {}", dir.display(), manifest.name);
                continue;
            }

            if !include_disabled {
                if let Some(filter) = &self.disabled_filter {
                    if filter(&manifest) {
                        continue;
                    }
                }
            }

            plugins.push(manifest);
        }

        plugins
    }

    /// 按名称定位插件目录
    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.plugins_root.join(name)
    }

    pub fn plugins_root(&self) -> &Path {
        &self.plugins_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_plugin(root: &Path, dir_name: &str, manifest_json: &str) {
        let dir = root.join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), manifest_json).unwrap();
    }

    fn valid_manifest(name: &str) -> String {
        format!(
            r#"{{
                "name": "{}",
                "title": "Test plugin",
                "description": {{ "en": "A test plugin" }},
                "authors": [ {{ "name": "QuickView Team" }} ],
                "version": "1.0.0",
                "link": "https://example.com",
                "functions": [ {{ "name": "run" }} ]
            }}"#,
            name
        )
    }

    #[test]
    fn test_missing_root_yields_empty_list() {
        let root = TempDir::new().unwrap();
        let registry = PluginRegistry::new(root.path().join("does-not-exist"));
        assert!(registry.plugins(true).is_empty(), "缺失的根目录按无插件处理");
    }

    #[test]
    fn test_scan_returns_one_entry_per_folder() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), "alpha", &valid_manifest("alpha"));
        write_plugin(root.path(), "beta", &valid_manifest("beta"));

        let registry = PluginRegistry::new(root.path().to_path_buf());
        let plugins = registry.plugins(true);
        assert_eq!(plugins.len(), 2);

        let names: Vec<&str> = plugins.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"alpha"));
        assert!(names.contains(&"beta"));
    }

    #[test]
    fn test_rescan_without_change_is_identical() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), "alpha", &valid_manifest("alpha"));
        write_plugin(root.path(), "beta", &valid_manifest("beta"));

        let registry = PluginRegistry::new(root.path().to_path_buf());
        let mut first: Vec<String> = registry
            .plugins(true)
            .into_iter()
            .map(|p| p.name)
            .collect();
        let mut second: Vec<String> = registry
            .plugins(true)
            .into_iter()
            .map(|p| p.name)
            .collect();
        first.sort();
        second.sort();
        assert_eq!(first, second, "无磁盘变化时两次扫描的名称集合必须一致");
    }

    #[test]
    fn test_malformed_manifest_is_skipped() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), "good", &valid_manifest("good"));
        write_plugin(root.path(), "broken", "{ not valid json");

        let registry = PluginRegistry::new(root.path().to_path_buf());
        let plugins = registry.plugins(true);
        assert_eq!(plugins.len(), 1, "损坏的插件不能遮蔽其余插件");
        assert_eq!(plugins[0].name, "good");
    }

    #[test]
    fn test_missing_manifest_is_skipped() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), "good", &valid_manifest("good"));
        fs::create_dir_all(root.path().join("empty-folder")).unwrap();

        let registry = PluginRegistry::new(root.path().to_path_buf());
        let plugins = registry.plugins(true);
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name, "good");
    }

    #[test]
    fn test_missing_required_field_is_skipped() {
        let root = TempDir::new().unwrap();
        // 缺少 version 字段
        write_plugin(root.path(), "noversion", r#"{ "name": "noversion" }"#);

        let registry = PluginRegistry::new(root.path().to_path_buf());
        assert!(registry.plugins(true).is_empty());
    }

    #[test]
    fn test_zero_functions_still_listed() {
        let root = TempDir::new().unwrap();
        write_plugin(
            root.path(),
            "nofunc",
            r#"{ "name": "nofunc", "version": "1.0", "functions": [] }"#,
        );

        let registry = PluginRegistry::new(root.path().to_path_buf());
        let plugins = registry.plugins(true);
        assert_eq!(plugins.len(), 1);
        assert!(plugins[0].representative_function().is_none());
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let root = TempDir::new().unwrap();
        // 两个目录声明同一个 name
        write_plugin(root.path(), "dir-a", &valid_manifest("dup"));
        write_plugin(root.path(), "dir-b", &valid_manifest("dup"));

        let registry = PluginRegistry::new(root.path().to_path_buf());
        let plugins = registry.plugins(true);
        assert_eq!(plugins.len(), 1, "重复名称不能静默合并，只保留先出现的");
        assert_eq!(plugins[0].name, "dup");
    }

    #[test]
    fn test_dot_prefixed_dirs_are_not_plugins() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), ".staging-abc", &valid_manifest("staged"));
        write_plugin(root.path(), "real", &valid_manifest("real"));

        let registry = PluginRegistry::new(root.path().to_path_buf());
        let plugins = registry.plugins(true);
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name, "real");
    }

    #[test]
    fn test_plain_files_in_root_are_ignored() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("stray.txt"), "not a plugin").unwrap();
        write_plugin(root.path(), "real", &valid_manifest("real"));

        let registry = PluginRegistry::new(root.path().to_path_buf());
        assert_eq!(registry.plugins(true).len(), 1);
    }

    #[test]
    fn test_disabled_filter_is_pass_through() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), "alpha", &valid_manifest("alpha"));
        write_plugin(root.path(), "beta", &valid_manifest("beta"));

        let mut registry = PluginRegistry::new(root.path().to_path_buf());
        registry.set_disabled_filter(|manifest| manifest.name == "beta");

        // include_disabled = true 时钩子不生效
        assert_eq!(registry.plugins(true).len(), 2);

        let enabled = registry.plugins(false);
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "alpha");
    }
}
