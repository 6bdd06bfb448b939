mod feeds;
mod mutations;
mod views;
