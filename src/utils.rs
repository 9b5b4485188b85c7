// 该文件是 Chepai （车牌） 项目的一部分。
// src/utils.rs - URL 辅助函数
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::str::FromStr;

use url::Url;

/// 取出 URL 中的文件路径，并做百分号解码
pub fn url_path(url: &Url) -> String {
  let raw = url.path();
  match urlencoding::decode(raw) {
    Ok(path) => path.into_owned(),
    Err(_) => raw.to_string(),
  }
}

/// 查询参数中某个键对应的字符串值
pub fn query_value(url: &Url, key: &str) -> Option<String> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .map(|(_, v)| v.into_owned())
}

/// 查询参数中某个键解析后的值；键不存在时返回 `Ok(None)`
pub fn query_parse<T: FromStr>(url: &Url, key: &str) -> Result<Option<T>, String> {
  match query_value(url, key) {
    Some(value) => value
      .parse::<T>()
      .map(Some)
      .map_err(|_| format!("查询参数 '{}' 的值无效: {}", key, value)),
    None => Ok(None),
  }
}
