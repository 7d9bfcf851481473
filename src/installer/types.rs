//! 插件安装器类型定义
//!
//! 定义安装/卸载错误类型、包格式和进度类型

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// 安装错误类型
#[derive(Error, Debug)]
pub enum InstallError {
    /// 扩展名不是受支持的压缩包格式，安装不产生任何副作用
    #[error("不支持的压缩包格式: {0}")]
    UnsupportedFormat(String),

    #[error("包格式无效: {0}")]
    InvalidPackage(String),

    #[error("清单无效: {0}")]
    InvalidManifest(String),

    #[error("解压失败: {0}")]
    ExtractFailed(String),

    /// 目标目录已存在。既有插件不会被覆盖或合并
    #[error("插件已存在: {0}")]
    AlreadyExists(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),
}

/// 卸载错误类型
#[derive(Error, Debug)]
pub enum UninstallError {
    /// 插件目录不存在（可能已被外部删除），区别于一般 IO 失败
    #[error("插件不存在: {0}")]
    NotFound(String),

    /// 移入回收站失败，原目录视为仍然存在
    #[error("删除失败: {0}")]
    DeletionFailed(String),
}

/// 包格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    /// ZIP 格式
    Zip,
    /// tar.gz 格式
    TarGz,
}

impl PackageFormat {
    /// 从文件扩展名检测格式
    pub fn from_extension(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
            Some(PackageFormat::TarGz)
        } else if file_name.ends_with(".zip") {
            Some(PackageFormat::Zip)
        } else {
            None
        }
    }
}

/// 安装阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStage {
    /// 验证中
    Validating,
    /// 解压中
    Extracting,
    /// 安装中
    Installing,
    /// 完成
    Complete,
    /// 失败
    Failed,
}

impl std::fmt::Display for InstallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallStage::Validating => write!(f, "validating"),
            InstallStage::Extracting => write!(f, "extracting"),
            InstallStage::Installing => write!(f, "installing"),
            InstallStage::Complete => write!(f, "complete"),
            InstallStage::Failed => write!(f, "failed"),
        }
    }
}

/// 安装进度
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallProgress {
    /// 当前阶段
    pub stage: InstallStage,
    /// 进度百分比 (0-100)
    pub percent: u8,
    /// 状态消息
    pub message: String,
}

impl InstallProgress {
    pub fn new(stage: InstallStage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent: percent.min(100),
            message: message.into(),
        }
    }

    pub fn validating(message: impl Into<String>) -> Self {
        Self::new(InstallStage::Validating, 0, message)
    }

    pub fn extracting(percent: u8, message: impl Into<String>) -> Self {
        Self::new(InstallStage::Extracting, percent, message)
    }

    pub fn installing(percent: u8, message: impl Into<String>) -> Self {
        Self::new(InstallStage::Installing, percent, message)
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(InstallStage::Complete, 100, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(InstallStage::Failed, 0, message)
    }
}

/// 进度回调 trait
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, progress: InstallProgress);
}

/// 空进度回调实现
pub struct NoopProgressCallback;

impl ProgressCallback for NoopProgressCallback {
    fn on_progress(&self, _progress: InstallProgress) {}
}

/// 把闭包包装为 ProgressCallback
pub struct FnProgressCallback<F>
where
    F: Fn(InstallProgress) + Send + Sync,
{
    callback: F,
}

impl<F> FnProgressCallback<F>
where
    F: Fn(InstallProgress) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressCallback for FnProgressCallback<F>
where
    F: Fn(InstallProgress) + Send + Sync,
{
    fn on_progress(&self, progress: InstallProgress) {
        (self.callback)(progress);
    }
}
