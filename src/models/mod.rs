//! 数据模型模块
//! 用户、刷新令牌以及认证请求/响应模型

pub mod auth;
pub mod session;
pub mod user;
