//! 插件安装器模块
//!
//! 提供插件的安装与卸载：
//! - 从本地压缩包 (.zip / .tar.gz) 安装插件
//! - 插件包格式与清单验证
//! - 安装进度回调
//! - 卸载插件（移入回收站，可恢复）

mod installer;
mod types;
mod validator;

pub use installer::PluginInstaller;
pub use types::{
    FnProgressCallback, InstallError, InstallProgress, InstallStage, NoopProgressCallback,
    PackageFormat, ProgressCallback, UninstallError,
};
pub use validator::PackageValidator;
