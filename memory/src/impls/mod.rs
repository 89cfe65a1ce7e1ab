pub mod ash;
