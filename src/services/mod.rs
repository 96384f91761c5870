pub mod database;
pub mod follow;
pub mod user;

// 重新导出常用类型
pub use database::Database;
pub use follow::FollowService;
pub use user::UserService;
