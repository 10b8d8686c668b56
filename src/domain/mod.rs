pub mod campaign;
pub mod decision;
pub mod keyword;
pub mod message;
pub mod opt_out;
pub mod webhook;
