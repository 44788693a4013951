pub mod heap_file;
