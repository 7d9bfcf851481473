//! QuickView 插件管理核心
//!
//! 提供图片查看器的插件扩展管理能力：
//! - 插件根目录扫描与清单解析
//! - 插件功能图标解析（深色/浅色主题变体）
//! - 从压缩包安装插件
//! - 卸载插件（移入回收站，可恢复）
//!
//! 扫描即事实来源：注册表不持有缓存，每次调用都从磁盘全量重建
//! 插件列表，外部对插件目录的修改在下一次扫描时立即可见。
//! 安装与卸载只写文件系统，调用方在写操作之后重新扫描即可同步状态。

mod icon;
mod installer;
mod registry;
mod types;

pub use icon::{IconResolver, PluginIcon};
pub use installer::{
    FnProgressCallback, InstallError, InstallProgress, InstallStage, NoopProgressCallback,
    PackageFormat, PackageValidator, PluginInstaller, ProgressCallback, UninstallError,
};
pub use registry::{DisabledFilter, PluginRegistry};
pub use types::{
    is_safe_name, LocalizedText, PluginAuthor, PluginError, PluginFunction, PluginManifest,
    DEFAULT_LANGUAGE, MANIFEST_FILE,
};
