mod common;

use common::{achromat, configuration, single, snapshot, two_singlets};
use lensforge::api::Workbench;
use lensforge::blocks::{expand, Block, BlockType};
use lensforge::config::Config;
use lensforge::edit::{apply_changes, map_surface_edit, BlockChange, EditError, SurfaceEdit};
use lensforge::surface::{OptimizeMode, SurfaceField, SurfaceRole, SurfaceType};
use lensforge::system::LiveTables;
use lensforge::value::Value;
use rstest::rstest;

/// Maps an edit of `field` on 1-based `row` against freshly expanded blocks.
fn map(blocks: &[Block], row: usize, field: SurfaceField, new_value: Value) -> Result<Vec<BlockChange>, EditError> {
    let rows = expand(blocks).into_rows().unwrap();
    let surface = &rows[row - 1];
    let edit = SurfaceEdit::new(row, field, surface.get(field), new_value);
    map_surface_edit(blocks, surface, &edit)
}

fn param(block_id: &str, variable: &str, new_value: Value) -> BlockChange {
    BlockChange::Parameter {
        block_id: block_id.to_string(),
        variable: variable.to_string(),
        new_value,
    }
}

// --- MAPPING ---

#[test]
fn test_doublet_inner_thickness_maps_to_second_element() {
    let blocks = achromat();
    let changes = map(&blocks, 4, SurfaceField::Thickness, Value::Number(3.0)).unwrap();
    assert_eq!(changes, vec![param("D1", "thickness2", Value::Number(3.0))]);

    let updated = apply_changes(&blocks, &changes).unwrap();
    let rows = expand(&updated).into_rows().unwrap();
    assert_eq!(rows[3].thickness, Value::Number(3.0));
    assert_eq!(rows[2].thickness, Value::Number(6.0));
}

#[test]
fn test_doublet_last_thickness_goes_to_following_gap() {
    let blocks = achromat();
    let changes = map(&blocks, 5, SurfaceField::Thickness, Value::Number(90.0)).unwrap();
    assert_eq!(changes, vec![param("G1", "thickness", Value::Number(90.0))]);
}

#[test]
fn test_coefficient_on_blank_type_sets_type_first() {
    let blocks = two_singlets();
    let changes = map(&blocks, 3, SurfaceField::Coef(1), Value::Number(1e-4)).unwrap();
    assert_eq!(
        changes,
        vec![
            param("L1", "frontSurfType", Value::Text("Aspheric even".into())),
            param("L1", "frontCoef1", Value::Number(1e-4)),
        ]
    );

    let updated = apply_changes(&blocks, &changes).unwrap();
    let rows = expand(&updated).into_rows().unwrap();
    assert_eq!(rows[2].surf_type, SurfaceType::AsphericEven);
    assert_eq!(rows[2].coefs[0], Value::Number(1e-4));
}

#[test]
fn test_coefficient_on_typed_surface_is_single_change() {
    let mut blocks = two_singlets();
    blocks[3].set_param("frontSurfType", Value::Text("Aspheric odd".into()));
    let changes = map(&blocks, 3, SurfaceField::Conic, Value::Number(-1.0)).unwrap();
    assert_eq!(changes, vec![param("L1", "frontConic", Value::Number(-1.0))]);
}

#[test]
fn test_missing_gap_is_created() {
    let mut blocks = two_singlets();
    blocks.remove(6); // G2
    let changes = map(&blocks, 6, SurfaceField::Thickness, Value::Number(38.0)).unwrap();
    assert_eq!(
        changes,
        vec![
            BlockChange::CreateGap {
                after_block_id: "L2".to_string(),
                block_id: "L2_gap".to_string(),
            },
            param("L2_gap", "thickness", Value::Number(38.0)),
        ]
    );

    let updated = apply_changes(&blocks, &changes).unwrap();
    assert_eq!(updated[6].block_id, "L2_gap");
    assert_eq!(updated[6].block_type, BlockType::Gap);
    let rows = expand(&updated).into_rows().unwrap();
    assert_eq!(rows[5].thickness, Value::Number(38.0));
    assert_eq!(rows[5].material, Value::Text("AIR".into()));
}

#[test]
fn test_back_thickness_edit_stays_on_owner_without_gap() {
    let mut blocks = two_singlets();
    blocks.remove(6); // G2
    blocks[5].set_param("backThickness", Value::Number(40.0));
    let changes = map(&blocks, 6, SurfaceField::Thickness, Value::Number(38.0)).unwrap();
    assert_eq!(changes, vec![param("L2", "backThickness", Value::Number(38.0))]);

    let updated = apply_changes(&blocks, &changes).unwrap();
    assert_eq!(updated.len(), blocks.len());
    let rows = expand(&updated).into_rows().unwrap();
    assert_eq!(rows[5].thickness, Value::Number(38.0));
}

#[test]
fn test_stop_rows() {
    let blocks = two_singlets();
    assert_eq!(
        map(&blocks, 2, SurfaceField::SemiDia, Value::Number(4.0)).unwrap(),
        vec![param("STO", "semiDiameter", Value::Number(4.0))]
    );
    assert_eq!(
        map(&blocks, 2, SurfaceField::Thickness, Value::Number(6.0)).unwrap(),
        vec![param("G0", "thickness", Value::Number(6.0))]
    );
}

#[test]
fn test_semidia_goes_to_aperture_map() {
    let blocks = two_singlets();
    let changes = map(&blocks, 7, SurfaceField::SemiDia, Value::Number(8.0)).unwrap();
    assert_eq!(
        changes,
        vec![BlockChange::ApertureSemidia {
            block_id: "IMG".to_string(),
            role: SurfaceRole::Image,
            new_value: Value::Number(8.0),
        }]
    );
    let updated = apply_changes(&blocks, &changes).unwrap();
    assert_eq!(updated[7].aperture_for("image"), Value::Number(8.0));
}

#[test]
fn test_optimize_flag_on_back_surface_marks_gap() {
    let blocks = two_singlets();
    let changes = map(&blocks, 4, SurfaceField::OptimizeT, Value::from("V")).unwrap();
    assert_eq!(
        changes,
        vec![BlockChange::OptimizeMode {
            block_id: "G1".to_string(),
            variable: "thickness".to_string(),
            mode: OptimizeMode::V,
        }]
    );
    let updated = apply_changes(&blocks, &changes).unwrap();
    assert_eq!(expand(&updated).rows[3].optimize_t, OptimizeMode::V);
    assert_eq!(updated[4].variables["thickness"].value, Value::Number(10.0));
}

#[test]
fn test_object_distance_accepts_infinity() {
    let mut blocks = two_singlets();
    blocks[0].set_param("objectDistance", Value::Number(500.0));
    let changes = map(&blocks, 1, SurfaceField::Thickness, Value::Inf).unwrap();
    assert_eq!(changes, vec![param("OBJ", "objectDistance", Value::Inf)]);
}

// --- REJECTIONS ---

#[rstest]
#[case(3, SurfaceField::Radius, Value::Number(60.0), EditError::Unchanged)]
#[case(3, SurfaceField::Radius, Value::Auto, EditError::Blank(SurfaceField::Radius))]
#[case(3, SurfaceField::Thickness, Value::Inf, EditError::InfNotAllowed(SurfaceField::Thickness))]
#[case(3, SurfaceField::OptimizeR, Value::from("maybe"), EditError::InvalidFlag(Value::from("maybe")))]
#[case(3, SurfaceField::OptimizeR, Value::from("F"), EditError::Unchanged)]
fn test_rejected_values(
    #[case] row: usize,
    #[case] field: SurfaceField,
    #[case] new_value: Value,
    #[case] expected: EditError,
) {
    assert_eq!(map(&two_singlets(), row, field, new_value), Err(expected));
}

#[test]
fn test_unmapped_column_is_rejected() {
    let err = map(&two_singlets(), 2, SurfaceField::Radius, Value::Number(10.0)).unwrap_err();
    assert!(matches!(
        err,
        EditError::Unmapped {
            block_type: BlockType::Stop,
            ..
        }
    ));
}

#[test]
fn test_inf_radius_is_accepted() {
    let changes = map(&two_singlets(), 3, SurfaceField::Radius, Value::Inf).unwrap();
    assert_eq!(changes, vec![param("L1", "frontRadius", Value::Inf)]);
}

// --- WORKBENCH ROUND TRIP ---

#[test]
fn test_edit_round_trip_refreshes_live_rows() {
    let systems = single(two_singlets());
    let live = LiveTables {
        rows: expand(&two_singlets()).rows,
        ..Default::default()
    };
    let mut bench = Workbench::new(systems, Config::default()).with_live(live);

    let changes = bench
        .edit_surface("Current", 4, SurfaceField::Thickness, Value::Number(12.5))
        .unwrap();
    assert_eq!(changes, vec![param("G1", "thickness", Value::Number(12.5))]);
    assert_eq!(bench.systems.configurations[0].blocks[4].param("thickness"), Value::Number(12.5));

    let live_rows = &bench.live.as_ref().unwrap().rows;
    assert_eq!(live_rows[3].thickness, Value::Number(12.5));
    assert_eq!(bench.expand_config(None).unwrap().rows, *live_rows);
}

#[test]
fn test_edit_of_inactive_config_leaves_live_alone() {
    let systems = snapshot(vec![
        configuration("A", two_singlets()),
        configuration("B", two_singlets()),
    ]);
    let live = LiveTables {
        rows: expand(&two_singlets()).rows,
        ..Default::default()
    };
    let mut bench = Workbench::new(systems, Config::default()).with_live(live);
    bench
        .edit_surface("B", 3, SurfaceField::Radius, Value::Number(55.0))
        .unwrap();

    assert_eq!(bench.systems.get("B").unwrap().blocks[3].param("frontRadius"), Value::Number(55.0));
    assert_eq!(bench.systems.get("A").unwrap().blocks[3].param("frontRadius"), Value::Number(60.0));
    assert_eq!(bench.live.as_ref().unwrap().rows[2].radius, Value::Number(60.0));
}

#[test]
fn test_edit_that_breaks_expansion_is_rolled_back() {
    let mut bench = Workbench::new(single(two_singlets()), Config::default());
    let before = bench.systems.clone();
    let err = bench
        .edit_surface("A", 4, SurfaceField::Thickness, Value::Number(-3.0))
        .unwrap_err();
    assert!(matches!(err, EditError::Rejected(ref issues) if !issues.is_empty()));
    assert_eq!(bench.systems, before);
}

#[test]
fn test_edit_lookup_errors() {
    let mut bench = Workbench::new(single(two_singlets()), Config::default());
    assert_eq!(
        bench.edit_surface("A", 99, SurfaceField::Radius, Value::Number(1.0)),
        Err(EditError::RowNotFound(99))
    );
    assert_eq!(
        bench.edit_surface("Z", 3, SurfaceField::Radius, Value::Number(1.0)),
        Err(EditError::ConfigNotFound("Z".to_string()))
    );
}

#[test]
fn test_edit_changes_merit() {
    use lensforge::merit::Operand;

    let mut bench = Workbench::new(single(two_singlets()), Config::default());
    let ops = [Operand::new("EFL")];
    let before = bench.merit_value(&ops);
    bench
        .edit_surface("A", 5, SurfaceField::Radius, Value::Number(60.0))
        .unwrap();
    let after = bench.merit_value(&ops);
    // L2 got stronger: shorter focal length.
    assert!(after < before);
}
