pub mod column_source;
