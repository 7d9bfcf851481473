//! 插件元数据模型
//!
//! 定义 PluginManifest、LocalizedText 等核心类型。
//! 清单实例在每次扫描时从磁盘重新构建，构建后不可变。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// 清单文件名，每个插件目录一份
pub const MANIFEST_FILE: &str = "plugin.json";

/// 描述文本的默认语言
pub const DEFAULT_LANGUAGE: &str = "en";

/// 插件扫描错误类型
///
/// 扫描过程中逐项包含，单个插件出错不会中断整次扫描
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("插件加载失败: {0}")]
    LoadError(String),

    #[error("清单文件无效: {0}")]
    InvalidManifest(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// 多语言文本
///
/// 语言代码到文本的映射。查找回退链：
/// 请求语言 → 默认语言 (en) → 第一个可用语言 → 空串
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一种语言的文本
    pub fn with(mut self, lang: impl Into<String>, text: impl Into<String>) -> Self {
        self.0.insert(lang.into(), text.into());
        self
    }

    /// 按语言代码取文本
    pub fn get(&self, lang: &str) -> &str {
        if let Some(text) = self.0.get(lang) {
            return text;
        }
        if let Some(text) = self.0.get(DEFAULT_LANGUAGE) {
            return text;
        }
        // BTreeMap 迭代有序，"第一个可用语言" 在两次扫描之间保持稳定
        self.0.values().next().map(String::as_str).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// 插件作者
///
/// 顺序即展示顺序
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginAuthor {
    pub name: String,
}

/// 插件暴露的功能
///
/// 核心只跟踪功能名及其图标关联，不负责功能的执行
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginFunction {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// 插件清单 (plugin.json)
///
/// 描述插件的标识、展示文本、作者、版本、主页和功能列表
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginManifest {
    /// 稳定标识，同时是磁盘目录名，必须文件系统安全
    pub name: String,
    /// 展示名称，不要求唯一
    #[serde(default)]
    pub title: String,
    /// 多语言描述
    #[serde(default)]
    pub description: LocalizedText,
    /// 作者列表，顺序即展示顺序
    #[serde(default)]
    pub authors: Vec<PluginAuthor>,
    /// 版本字符串，核心不做语义化版本解析
    pub version: String,
    /// 插件主页地址
    #[serde(default)]
    pub link: String,
    /// 功能列表。允许为空：无功能的插件没有代表图标
    #[serde(default)]
    pub functions: Vec<PluginFunction>,
}

impl PluginManifest {
    /// 验证清单有效性
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.name.is_empty() {
            return Err(PluginError::InvalidManifest("插件名称不能为空".to_string()));
        }
        if !is_safe_name(&self.name) {
            return Err(PluginError::InvalidManifest(
                "插件名称只能包含字母、数字、连字符和下划线".to_string(),
            ));
        }
        if self.name.len() > 64 {
            return Err(PluginError::InvalidManifest(
                "插件名称长度不能超过 64 个字符".to_string(),
            ));
        }
        if self.version.is_empty() {
            return Err(PluginError::InvalidManifest("插件版本不能为空".to_string()));
        }
        for function in &self.functions {
            if function.name.is_empty() {
                return Err(PluginError::InvalidManifest(
                    "功能名称不能为空".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// 列表展示标题: "title (name)"
    pub fn display_title(&self) -> String {
        format!("{} ({})", self.title, self.name)
    }

    /// 展示版本: "v1.2.3"
    pub fn display_version(&self) -> String {
        format!("v{}", self.version)
    }

    /// 作者展示行，按声明顺序以 ", " 连接
    pub fn authors_line(&self) -> String {
        self.authors
            .iter()
            .map(|author| author.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 代表功能（第一个），其图标作为插件的列表图标
    pub fn representative_function(&self) -> Option<&PluginFunction> {
        self.functions.first()
    }
}

/// 名称是否可以安全地用作目录名
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> PluginManifest {
        PluginManifest {
            name: "external-edit".to_string(),
            title: "External edit".to_string(),
            description: LocalizedText::new()
                .with("en", "Edit the picture in an external editor")
                .with("ru", "Редактировать во внешнем редакторе"),
            authors: vec![
                PluginAuthor {
                    name: "Module Art".to_string(),
                },
                PluginAuthor {
                    name: "QuickView Team".to_string(),
                },
            ],
            version: "1.2".to_string(),
            link: "https://example.com/external-edit".to_string(),
            functions: vec![PluginFunction {
                name: "edit".to_string(),
                title: Some("Edit".to_string()),
            }],
        }
    }

    #[test]
    fn test_localized_text_requested_language() {
        let text = LocalizedText::new().with("en", "hello").with("ru", "привет");
        assert_eq!(text.get("ru"), "привет");
    }

    #[test]
    fn test_localized_text_falls_back_to_default() {
        let text = LocalizedText::new().with("en", "hello").with("ru", "привет");
        assert_eq!(text.get("de"), "hello", "缺失语言应回退到默认语言");
    }

    #[test]
    fn test_localized_text_falls_back_to_first_available() {
        let text = LocalizedText::new().with("uk", "привіт").with("ru", "привет");
        // 没有请求语言也没有 en 时取第一个可用语言（按键排序）
        assert_eq!(text.get("de"), "привет");
    }

    #[test]
    fn test_localized_text_empty() {
        let text = LocalizedText::new();
        assert_eq!(text.get("en"), "");
    }

    #[test]
    fn test_display_forms() {
        let manifest = sample_manifest();
        assert_eq!(manifest.display_title(), "External edit (external-edit)");
        assert_eq!(manifest.display_version(), "v1.2");
        assert_eq!(manifest.authors_line(), "Module Art, QuickView Team");
    }

    #[test]
    fn test_representative_function() {
        let manifest = sample_manifest();
        assert_eq!(manifest.representative_function().unwrap().name, "edit");

        let mut empty = sample_manifest();
        empty.functions.clear();
        assert!(empty.representative_function().is_none());
    }

    #[test]
    fn test_validate_accepts_zero_functions() {
        let mut manifest = sample_manifest();
        manifest.functions.clear();
        assert!(manifest.validate().is_ok(), "无功能的插件仍然是合法清单");
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mut manifest = sample_manifest();
        manifest.name = String::new();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unsafe_name() {
        let mut manifest = sample_manifest();
        manifest.name = "../escape".to_string();
        assert!(manifest.validate().is_err());

        manifest.name = "a/b".to_string();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overlong_name() {
        let mut manifest = sample_manifest();
        manifest.name = "x".repeat(65);
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_version() {
        let mut manifest = sample_manifest();
        manifest.version = String::new();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_function_name() {
        let mut manifest = sample_manifest();
        manifest.functions.push(PluginFunction {
            name: String::new(),
            title: None,
        });
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_manifest_deserializes_with_defaults() {
        // name 和 version 必填，其余字段缺省
        let json = r#"{ "name": "minimal", "version": "0.1" }"#;
        let manifest: PluginManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.name, "minimal");
        assert!(manifest.title.is_empty());
        assert!(manifest.description.is_empty());
        assert!(manifest.authors.is_empty());
        assert!(manifest.functions.is_empty());
    }

    #[test]
    fn test_manifest_missing_required_field_fails() {
        let json = r#"{ "title": "no name", "version": "0.1" }"#;
        assert!(serde_json::from_str::<PluginManifest>(json).is_err());
    }

    #[test]
    fn test_is_safe_name() {
        assert!(is_safe_name("external-edit"));
        assert!(is_safe_name("plugin_2"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name("a b"));
        assert!(!is_safe_name("a/b"));
        assert!(!is_safe_name("..\\b"));
    }
}
