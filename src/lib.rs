//! Cloudy - 云主题对话助手
//!
//! 把用户消息依次交给一组优先级有序的 provider（网页搜索、本地模型、
//! 两个托管对话 API、通用推理 API），返回第一条可用回复；全部失败时
//! 由规则引擎兜底，保证每条消息都有回复。

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod providers;
pub mod services;
pub mod storage;
