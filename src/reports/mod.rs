mod tables;

pub use self::tables::{
    issues as print_issues, merit as print_merit_report, surfaces as print_surface_table,
    variables as print_variables,
};
