pub mod evaluate;
pub mod expand;
pub mod variables;
