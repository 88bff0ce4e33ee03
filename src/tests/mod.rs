mod avl;
mod monitor;
mod proptests;
