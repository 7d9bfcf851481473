//! 插件图标解析
//!
//! 按插件名 + 功能名定位并解码图标资源，支持深色/浅色主题变体。
//! 找不到图标或资源损坏都返回 None，由调用方决定兜底图标，
//! 列表渲染过程不会因为单个损坏的资源而中断。

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::registry::PluginRegistry;
use crate::types::PluginManifest;

/// 图标子目录名
const ICONS_DIR: &str = "icons";

/// 已解码的插件图标
///
/// 纯内存数据，归调用方所有，随所有权释放
pub struct PluginIcon {
    pub image: DynamicImage,
    /// 命中的图标文件路径
    pub path: PathBuf,
}

pub struct IconResolver {
    plugins_root: PathBuf,
}

impl IconResolver {
    pub fn new(plugins_root: PathBuf) -> Self {
        Self { plugins_root }
    }

    pub fn with_defaults() -> Self {
        Self::new(PluginRegistry::default_plugins_root())
    }

    /// 解析插件功能的图标
    ///
    /// prefer_dark 决定主题变体的探测顺序，变体缺失时回退到无后缀文件
    pub fn resolve(
        &self,
        plugin_name: &str,
        function_name: &str,
        prefer_dark: bool,
    ) -> Option<PluginIcon> {
        if plugin_name.is_empty() || function_name.is_empty() {
            return None;
        }

        let plugin_dir = self.plugins_root.join(plugin_name);
        if !plugin_dir.is_dir() {
            return None;
        }

        for candidate in candidate_paths(&plugin_dir, function_name, prefer_dark) {
            if !candidate.is_file() {
                continue;
            }
            match image::open(&candidate) {
                Ok(image) => {
                    return Some(PluginIcon {
                        image,
                        path: candidate,
                    })
                }
                Err(e) => {
                    // 损坏的资源等同于不存在，继续尝试下一个候选
                    tracing::debug!("图标解码失败 {}: {}", candidate.display(), e);
                }
            }
        }

        None
    }

    /// 解析插件的代表图标（第一个功能的图标）
    ///
    /// 没有任何功能的插件没有代表图标
    pub fn resolve_for(&self, plugin: &PluginManifest, prefer_dark: bool) -> Option<PluginIcon> {
        let function = plugin.representative_function()?;
        self.resolve(&plugin.name, &function.name, prefer_dark)
    }

    pub fn plugins_root(&self) -> &Path {
        &self.plugins_root
    }
}

/// 候选图标路径，先探测 icons/ 子目录再探测插件根目录
fn candidate_paths(plugin_dir: &Path, function_name: &str, prefer_dark: bool) -> Vec<PathBuf> {
    let file_names = if prefer_dark {
        [
            format!("{function_name}_dark.png"),
            format!("{function_name}.png"),
            format!("{function_name}_light.png"),
        ]
    } else {
        [
            format!("{function_name}_light.png"),
            format!("{function_name}.png"),
            format!("{function_name}_dark.png"),
        ]
    };

    let mut paths = Vec::with_capacity(file_names.len() * 2);
    for dir in [plugin_dir.join(ICONS_DIR), plugin_dir.to_path_buf()] {
        for name in &file_names {
            paths.push(dir.join(name));
        }
    }
    paths
}
