pub mod heap_file_iterator;
pub mod iterator;
pub mod slot_page_iterator;
