mod extract_temp;
mod fs_model;
mod inline_temp;
mod promote_temp;
mod rename_package;
mod rename_parameters;
mod rename_temp;
mod reorder_parameters;
mod self_encapsulate;
