pub mod init;
pub mod view;
pub mod page;
pub mod mutate;
pub mod live;
pub mod poll;
