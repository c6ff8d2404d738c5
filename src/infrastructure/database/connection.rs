// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::DatabaseSettings;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;
use tracing::log;

/// 创建数据库连接池
///
/// # 参数
///
/// * `settings` - 数据库配置
///
/// # 返回值
///
/// * `Ok(DatabaseConnection)` - 连接池
/// * `Err(DbErr)` - 连接失败
pub async fn create_pool(settings: &DatabaseSettings) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(settings.url.clone());

    if let Some(max) = settings.max_connections {
        options.max_connections(max);
    }
    if let Some(min) = settings.min_connections {
        options.min_connections(min);
    }
    if let Some(timeout) = settings.connect_timeout {
        options.connect_timeout(Duration::from_secs(timeout));
    }
    if let Some(idle) = settings.idle_timeout {
        options.idle_timeout(Duration::from_secs(idle));
    }
    options.sqlx_logging_level(log::LevelFilter::Debug);

    Database::connect(options).await
}
