mod helpers;
mod list;
mod plan;
mod recipe;

pub(crate) use list::{
    ExportFormat, ListOptions, cmd_list_add, cmd_list_add_recipe, cmd_list_check, cmd_list_clear,
    cmd_list_delete, cmd_list_export, cmd_list_regenerate, cmd_list_remove_recipe, cmd_list_show,
};
pub(crate) use plan::{cmd_plan_add, cmd_plan_remove, cmd_plan_show};
pub(crate) use recipe::{
    cmd_recipe_add_ingredient, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_import,
    cmd_recipe_list, cmd_recipe_remove_ingredient, cmd_recipe_show,
};
