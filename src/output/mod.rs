pub mod output_domain_table;
pub mod output_tabular;
pub mod path_buf_ext;
