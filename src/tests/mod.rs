
mod engine_test;
mod lock_manager_test;
mod slotted_page_test;
