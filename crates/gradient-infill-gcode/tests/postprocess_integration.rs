use gradient_infill_core::{GradientConfig, Point3D, ReinforcementTarget};
use gradient_infill_gcode::{
    postprocess, postprocess_with_options, postprocess_with_report, AbsoluteCarry,
    RewriteOptions,
};

fn sphere(x: f64, y: f64, z: f64, outer: f64, inner: f64) -> ReinforcementTarget {
    ReinforcementTarget::new(Point3D::new(x, y, z), outer, inner)
}

#[test]
fn test_single_move_doubled() {
    let out = postprocess(
        "G1 X10 Y10 Z1 E5 F1200",
        &GradientConfig::flat(200.0),
        &[sphere(10.0, 10.0, 1.0, 20.0, 0.0)],
    );
    assert_eq!(out, "G1 X10 Y10 Z1 E10 F1200");
}

#[test]
fn test_point_at_target_center_uses_max_flow() {
    let config = GradientConfig {
        max_flow: 550.0,
        min_flow: 100.0,
        enable_gradient: false,
        gradient_discretization: 4,
        baseline_flow: 100.0,
    };
    let out = postprocess(
        "G1 X10 Y10 Z1 E5 F1200",
        &config,
        &[sphere(10.0, 10.0, 1.0, 1.0, 0.0)],
    );
    assert_eq!(out, "G1 X10 Y10 Z1 E27.5 F1200");
}

#[test]
fn test_comment_only_line_unchanged() {
    let out = postprocess(
        "; comment only",
        &GradientConfig::flat(400.0),
        &[sphere(0.0, 0.0, 0.0, 1000.0, 0.0)],
    );
    assert_eq!(out, "; comment only");
}

#[test]
fn test_non_gcode_text_passes_through() {
    let input = "hello world\nthis is not\n\tG-code at all\n";
    let out = postprocess(
        input,
        &GradientConfig::flat(300.0),
        &[sphere(0.0, 0.0, 0.0, 1000.0, 0.0)],
    );
    assert_eq!(out, input);
}

#[test]
fn test_absolute_moves_after_target_keep_their_values() {
    let input = "G90\nM82\nG92 E0\nG1 X0 Y0 Z0.2 F1200\nG1 X1 Y0 E1\nG1 X2 Y0 E2\nG1 X50 Y0 E3\nG1 X60 Y0 E4\n";
    let out = postprocess(
        input,
        &GradientConfig::flat(200.0),
        &[sphere(1.0, 0.0, 0.2, 0.5, 0.0)],
    );
    assert_eq!(
        out,
        "G90\nM82\nG92 E0\nG1 X0 Y0 Z0.2 F1200\nG1 X1 Y0 E2\nG1 X2 Y0 E2\nG1 X50 Y0 E3\nG1 X60 Y0 E4\n"
    );
}

#[test]
fn test_absolute_shift_carries_added_filament() {
    let input = "M82\nG1 X0 Y0 Z0.2\nG1 X1 Y0 E1\nG1 X2 Y0 E2\nG1 X50 Y0 E3\nG92 E0\nG1 X60 Y0 E1\n";
    let options = RewriteOptions {
        absolute_carry: AbsoluteCarry::Shift,
        ..RewriteOptions::default()
    };
    let out = postprocess_with_options(
        input,
        &GradientConfig::flat(200.0),
        &[sphere(1.0, 0.0, 0.2, 0.5, 0.0)],
        &options,
    );
    assert_eq!(
        out,
        "M82\nG1 X0 Y0 Z0.2\nG1 X1 Y0 E2\nG1 X2 Y0 E3\nG1 X50 Y0 E4\nG92 E0\nG1 X60 Y0 E1\n"
    );
}

#[test]
fn test_g92_resets_cumulative_extrusion() {
    let out = postprocess(
        "G1 X0 Y0 Z0 E5\nG92 E0\nG1 X0 E1",
        &GradientConfig::flat(200.0),
        &[sphere(0.0, 0.0, 0.0, 1.0, 0.0)],
    );
    assert_eq!(out, "G1 X0 Y0 Z0 E10\nG92 E0\nG1 X0 E2");
}

#[test]
fn test_stepped_gradient_levels() {
    let input = "M83\nG1 X9 E1\nG1 X5 E1\nG1 X1 E1\nG1 X10 E1";
    let out = postprocess(
        input,
        &GradientConfig::stepped(300.0, 100.0, 3),
        &[sphere(0.0, 0.0, 0.0, 10.0, 2.0)],
    );
    assert_eq!(out, "M83\nG1 X9 E1\nG1 X5 E2\nG1 X1 E3\nG1 X10 E1");
}

#[test]
fn test_overlapping_targets_take_strongest() {
    let config = GradientConfig::stepped(400.0, 200.0, 2);
    // Point (5, 0, 0): 5 from the first target (outer ring, 200%),
    // 1 from the second (core, 400%)
    let targets = [sphere(0.0, 0.0, 0.0, 8.0, 1.0), sphere(6.0, 0.0, 0.0, 3.0, 1.0)];
    let out = postprocess("M83\nG1 X5 E0.5", &config, &targets);
    assert_eq!(out, "M83\nG1 X5 E2");
}

#[test]
fn test_column_target_limits_height() {
    let column = ReinforcementTarget::column(Point3D::new(0.0, 0.0, 1.0), 2.0, 5.0, 0.0);
    let out = postprocess(
        "M83\nG1 X1 Z0.5 E1\nG1 X1 Z1.5 E1\nG1 X1 Z3 E1",
        &GradientConfig::flat(200.0),
        &[column],
    );
    assert_eq!(out, "M83\nG1 X1 Z0.5 E1\nG1 X1 Z1.5 E2\nG1 X1 Z3 E1");
}

#[test]
fn test_fill_only_relative_program() {
    let input = concat!(
        ";FLAVOR:Marlin\n",
        "M83\n",
        ";TYPE:WALL-OUTER\n",
        "G1 X0.5 Y0 Z0.2 E0.05\n",
        ";TYPE:FILL\n",
        "G1 X0.6 Y0 E0.05\n",
        "G0 X100 Y100\n",
        "G1 X101 E0.05\n",
    );
    let options = RewriteOptions::default().with_features(["FILL"]);
    let out = postprocess_with_options(
        input,
        &GradientConfig::flat(200.0),
        &[sphere(0.0, 0.0, 0.2, 2.0, 0.0)],
        &options,
    );
    assert_eq!(
        out,
        concat!(
            ";FLAVOR:Marlin\n",
            "M83\n",
            ";TYPE:WALL-OUTER\n",
            "G1 X0.5 Y0 Z0.2 E0.05\n",
            ";TYPE:FILL\n",
            "G1 X0.6 Y0 E0.1\n",
            "G0 X100 Y100\n",
            "G1 X101 E0.05\n",
        )
    );
}

#[test]
fn test_crlf_and_comments_preserved() {
    let input = "M83\r\nG1 X0 Y0 E1.0 ; wall\r\nG1 X0 Y0 E-0.8\r\n";
    let out = postprocess(
        input,
        &GradientConfig::flat(150.0),
        &[sphere(0.0, 0.0, 0.0, 1.0, 0.0)],
    );
    assert_eq!(out, "M83\r\nG1 X0 Y0 E1.5 ; wall\r\nG1 X0 Y0 E-0.8\r\n");
}

#[test]
fn test_checksummed_line_kept_verbatim() {
    let input = "M83\nN10 G1 X0 Y0 E1*45\nG1 X0 Y0 E1";
    let output = postprocess_with_report(
        input,
        &GradientConfig::flat(200.0),
        &[sphere(0.0, 0.0, 0.0, 1.0, 0.0)],
        &RewriteOptions::default(),
    );
    assert_eq!(output.gcode, "M83\nN10 G1 X0 Y0 E1*45\nG1 X0 Y0 E2");
    assert_eq!(output.report.degraded_lines, 1);
}

#[test]
fn test_report_extrusion_totals() {
    let output = postprocess_with_report(
        "M83\nG1 X0 E1\nG1 X50 E1\nG1 E-0.5\nG1 E0.5",
        &GradientConfig::flat(300.0),
        &[sphere(0.0, 0.0, 0.0, 1.0, 0.0)],
        &RewriteOptions::default(),
    );
    assert_eq!(output.gcode, "M83\nG1 X0 E3\nG1 X50 E1\nG1 E-0.5\nG1 E0.5");
    assert_eq!(output.report.moves, 4);
    assert_eq!(output.report.extrusion_moves, 3);
    assert_eq!(output.report.reinforced_moves, 1);
}

#[test]
fn test_report_counts_only_rewritten_lines() {
    let output = postprocess_with_report(
        "M82\nG1 X0 Y0 Z0 E1\nG1 X50 Y0 E2\nG1 X60 Y0 E3",
        &GradientConfig::flat(200.0),
        &[sphere(0.0, 0.0, 0.0, 1.0, 0.0)],
        &RewriteOptions::default(),
    );
    assert_eq!(output.gcode, "M82\nG1 X0 Y0 Z0 E2\nG1 X50 Y0 E2\nG1 X60 Y0 E3");
    assert_eq!(output.report.extrusion_moves, 3);
    assert_eq!(output.report.reinforced_moves, 1);
}
