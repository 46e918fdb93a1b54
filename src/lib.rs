pub mod expansion;
pub mod model;
pub mod node;
pub mod output;
pub mod rows;
pub mod script;
pub mod search;
pub mod selection;
pub mod source;
pub mod tree;
pub mod tui;
pub mod ui;
pub mod watch;
