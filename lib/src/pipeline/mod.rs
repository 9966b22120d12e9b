//! Pipeline module - orchestrates the complete toolpath process.
//!
//! outlines → islands → insets → skins → support → adhesion → layer plans → sink
//!
//! Preparation ([`PrintPipeline::prepare`]) builds a [`SlicedModel`]: every
//! island with its rings and fill regions, the support areas, skirt, brim
//! and wipe tower. Writing ([`PrintPipeline::write`]) walks the model layer
//! by layer, queues every path into a [`LayerPlanner`] and flushes it into a
//! [`MotionSink`].
//!
//! # Per-layer order
//!
//! 1. Skirt and brim (first layer only)
//! 2. Each extruder's islands: bridges, walls, sparse fill, solid fill,
//!    bottom skin, top skin
//! 3. Support and support interface, wipe tower
//! 4. Air-gapped pass: model and support resting on support, raised by the
//!    air gap
//! 5. Minimum layer time, fan, travel to the next layer's seam
//!
//! # Example
//!
//! ```rust,ignore
//! use layerpath::{CancellationToken, GCodeWriter, PrintConfig, PrintPipeline};
//!
//! let pipeline = PrintPipeline::new(PrintConfig::default().perimeters(2))?;
//! let mut writer = GCodeWriter::new(std::io::stdout(), pipeline.config());
//! let summary = pipeline.run(outlines, &mut writer, &CancellationToken::new())?;
//! println!("{} layers", summary.layers);
//! ```

use crate::adhesion::{generate_brim, generate_skirt};
use crate::bridge::bridge_angle;
use crate::cancel::CancellationToken;
use crate::config::PrintConfig;
use crate::gcode::{fan_speed_percent, LayerPlanner, MotionSink, PathStyle, PathStyles, WipeTower};
use crate::geometry::{BoundingBox, Line, Point, Polygon, PolygonSet, Polyline};
use crate::infill::{chain_segments, generate_infill, generate_line_paths, InfillPath};
use crate::island::{Island, Layer, LayerStack};
use crate::order::{best_edge_index, PathOrderOptimizer};
use crate::slice::{check_layer_counts, slice_meshes, PlaneSlicer, SlicingParams, TriangleMesh};
use crate::support::SupportAreas;
use crate::{scale, Coord, CoordF, Error, Result, VERSION};
use log::{debug, info};
use std::time::Instant;

/// Everything needed to write a print, computed once before the first layer.
#[derive(Debug)]
pub struct SlicedModel {
    /// One stack per extruder, all the same length.
    pub stacks: Vec<LayerStack>,
    pub support: Option<SupportAreas>,
    pub skirt: Vec<Polygon>,
    pub brim: Vec<Polygon>,
    pub wipe_tower: Option<WipeTower>,
    /// Footprint of the model over all layers.
    pub bounds: BoundingBox,
    /// Layers to write; empty layers at the top are not counted.
    pub layer_count: usize,
}

impl SlicedModel {
    pub fn extruder_count(&self) -> usize {
        self.stacks.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }
}

/// What a finished print looked like.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrintSummary {
    pub layers: usize,
    pub extruders: usize,
    pub with_support: bool,
    /// Estimated print time in seconds, after cooling slowdowns.
    pub estimated_seconds: CoordF,
}

/// Turns per-layer outlines into a motion stream.
#[derive(Debug, Clone)]
pub struct PrintPipeline {
    config: PrintConfig,
}

impl PrintPipeline {
    /// Validates `config` and applies the spiral-mode overrides.
    pub fn new(mut config: PrintConfig) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        config.apply_spiral_overrides();
        Ok(Self { config })
    }

    pub fn config(&self) -> &PrintConfig {
        &self.config
    }

    /// Slicing planes matching this configuration's layer heights.
    pub fn slicing_params(&self) -> SlicingParams {
        SlicingParams::new(self.config.first_layer_height, self.config.layer_height)
    }

    /// Slice `meshes` (one per extruder) with `slicer`, then prepare them.
    pub fn prepare_from_meshes(
        &self,
        meshes: &[TriangleMesh],
        slicer: &dyn PlaneSlicer,
        cancel: &CancellationToken,
    ) -> Result<SlicedModel> {
        cancel.check()?;
        let outlines = slice_meshes(meshes, slicer, &self.slicing_params())?;
        self.prepare(outlines, cancel)
    }

    /// Build the island model for `outlines`, indexed `[extruder][layer]`.
    pub fn prepare(
        &self,
        outlines: Vec<Vec<PolygonSet>>,
        cancel: &CancellationToken,
    ) -> Result<SlicedModel> {
        self.prepare_with_callback(outlines, cancel, |_, _| {})
    }

    /// Like [`prepare`](Self::prepare), reporting `(stage, fraction)` as it goes.
    pub fn prepare_with_callback<F>(
        &self,
        outlines: Vec<Vec<PolygonSet>>,
        cancel: &CancellationToken,
        mut callback: F,
    ) -> Result<SlicedModel>
    where
        F: FnMut(&str, f64),
    {
        let config = &self.config;
        let total = check_layer_counts(&outlines)?;
        cancel.check()?;

        let started = Instant::now();
        let mut stacks: Vec<LayerStack> = outlines
            .into_iter()
            .enumerate()
            .map(|(extruder, layers)| {
                let layers = layers
                    .iter()
                    .enumerate()
                    .map(|(i, outline)| Layer::new(i, config.scaled_layer_z(i), outline))
                    .collect();
                LayerStack::new(extruder, layers)
            })
            .collect();
        info!(
            "Built islands for {} extruder(s), {} layers",
            stacks.len(),
            total
        );

        callback("insets", 0.0);
        for layer_index in 0..total {
            cancel.check()?;
            let (width, outer_width) = self.widths(layer_index);
            for stack in &mut stacks {
                stack.layers[layer_index].generate_insets(width, outer_width, config.perimeters);
            }
            callback("insets", (layer_index + 1) as f64 / total as f64);
        }
        info!("Generated insets in {:.2}s", started.elapsed().as_secs_f64());

        let started = Instant::now();
        callback("skins", 0.0);
        for layer_index in 0..total {
            cancel.check()?;
            let (width, outer_width) = self.widths(layer_index);
            for stack in &mut stacks {
                stack.generate_top_and_bottoms(
                    layer_index,
                    width,
                    outer_width,
                    config.bottom_layers,
                    config.top_layers,
                );
            }
            callback("skins", (layer_index + 1) as f64 / total as f64);
        }
        info!("Generated skins in {:.2}s", started.elapsed().as_secs_f64());

        cancel.check()?;
        let support = if config.generate_support {
            callback("support", 0.0);
            let started = Instant::now();
            let merged: Vec<PolygonSet> = (0..total)
                .map(|i| {
                    let mut all = PolygonSet::new();
                    for stack in &stacks {
                        all.extend(stack.layers[i].outline.clone());
                    }
                    all.union_self()
                })
                .collect();
            let support = SupportAreas::new(config, merged);
            // Filling layer 0 fills every layer above it.
            let base = support.required_support_areas(0).area();
            debug!("Support footprint on the bed: {:.1}mm²", base / 1e6);
            callback("support", 1.0);
            info!("Computed support areas in {:.2}s", started.elapsed().as_secs_f64());
            Some(support)
        } else {
            None
        };

        let mut bounds = BoundingBox::new();
        for stack in &stacks {
            for layer in &stack.layers {
                bounds.merge(&layer.outline.bounding_box());
            }
        }

        let wipe_tower = WipeTower::new(config, &bounds, stacks.len());
        let (skirt, brim) = self.generate_adhesion(&stacks, support.as_ref(), wipe_tower.as_ref());

        let layer_count = stacks
            .iter()
            .filter_map(LayerStack::last_non_empty_layer)
            .max()
            .map_or(0, |top| top + 1);
        if layer_count < total {
            debug!("Dropping {} empty layers at the top", total - layer_count);
        }

        Ok(SlicedModel {
            stacks,
            support,
            skirt,
            brim,
            wipe_tower,
            bounds,
            layer_count,
        })
    }

    /// (inner width, outer width) for one layer.
    fn widths(&self, layer_index: usize) -> (Coord, Coord) {
        if layer_index == 0 {
            let width = self.config.scaled_first_layer_extrusion_width();
            (width, width)
        } else {
            (
                self.config.scaled_extrusion_width(),
                self.config.scaled_outside_extrusion_width(),
            )
        }
    }

    fn generate_adhesion(
        &self,
        stacks: &[LayerStack],
        support: Option<&SupportAreas>,
        wipe_tower: Option<&WipeTower>,
    ) -> (Vec<Polygon>, Vec<Polygon>) {
        let config = &self.config;
        let mut model = PolygonSet::new();
        for stack in stacks {
            if let Some(layer) = stack.layers.first() {
                model.extend(layer.outline.clone());
            }
        }
        let model = model.union_self();
        let width = config.scaled_first_layer_extrusion_width();
        let brim = generate_brim(&model, width, config.brim_loops);

        let mut footprint = model;
        if let Some(support) = support {
            footprint = footprint.union(support.required_support_areas(0));
        }
        if let Some(tower) = wipe_tower {
            footprint = footprint.union(tower.outline());
        }
        let distance = scale(config.skirt_distance) + config.brim_loops as Coord * width;
        let skirt = generate_skirt(
            &footprint,
            distance,
            width,
            config.skirt_loops,
            scale(config.skirt_min_length),
        );
        (skirt, brim)
    }

    /// Write a prepared model into `sink`.
    pub fn write<S: MotionSink + ?Sized>(
        &self,
        model: &mut SlicedModel,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<PrintSummary> {
        self.write_with_callback(model, sink, cancel, |_, _| {})
    }

    /// Like [`write`](Self::write), reporting `("layers", fraction)` after
    /// every layer. On cancellation the sink is finished before returning.
    pub fn write_with_callback<S, F>(
        &self,
        model: &mut SlicedModel,
        sink: &mut S,
        cancel: &CancellationToken,
        mut callback: F,
    ) -> Result<PrintSummary>
    where
        S: MotionSink + ?Sized,
        F: FnMut(&str, f64),
    {
        match self.write_layers(model, sink, cancel, &mut callback) {
            Err(Error::Cancelled) => {
                info!("Cancelled, closing output");
                sink.finish()?;
                Err(Error::Cancelled)
            }
            other => other,
        }
    }

    /// Prepare and write in one go.
    pub fn run<S: MotionSink + ?Sized>(
        &self,
        outlines: Vec<Vec<PolygonSet>>,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<PrintSummary> {
        self.run_with_callback(outlines, sink, cancel, |_, _| {})
    }

    pub fn run_with_callback<S, F>(
        &self,
        outlines: Vec<Vec<PolygonSet>>,
        sink: &mut S,
        cancel: &CancellationToken,
        mut callback: F,
    ) -> Result<PrintSummary>
    where
        S: MotionSink + ?Sized,
        F: FnMut(&str, f64),
    {
        let mut model = match self.prepare_with_callback(outlines, cancel, &mut callback) {
            Ok(model) => model,
            Err(Error::Cancelled) => {
                info!("Cancelled, closing output");
                sink.finish()?;
                return Err(Error::Cancelled);
            }
            Err(e) => return Err(e),
        };
        self.write_with_callback(&mut model, sink, cancel, callback)
    }

    fn write_header<S: MotionSink + ?Sized>(&self, sink: &mut S, layer_count: usize) -> Result<()> {
        let config = &self.config;
        sink.comment(&format!("Generated with layerpath {}", VERSION))?;
        sink.comment(&format!("filamentDiameter = {}", config.filament_diameter))?;
        sink.comment(&format!("extrusionWidth = {}", config.extrusion_width))?;
        sink.comment(&format!(
            "firstLayerExtrusionWidth = {}",
            config.first_layer_extrusion_width
        ))?;
        sink.comment(&format!("layerThickness = {}", config.layer_height))?;
        sink.comment(&format!("firstLayerThickness = {}", config.first_layer_height))?;
        if !config.start_code.is_empty() {
            sink.write_raw(&config.start_code)?;
        }
        sink.comment(&format!("Layer count: {}", layer_count))
    }

    fn write_layers<S, F>(
        &self,
        model: &mut SlicedModel,
        sink: &mut S,
        cancel: &CancellationToken,
        callback: &mut F,
    ) -> Result<PrintSummary>
    where
        S: MotionSink + ?Sized,
        F: FnMut(&str, f64),
    {
        let config = &self.config;
        let started = Instant::now();
        cancel.check()?;

        let total = model.layer_count;
        self.write_header(sink, total)?;

        let SlicedModel {
            stacks,
            support,
            skirt,
            brim,
            wipe_tower,
            ..
        } = model;
        let support = support.as_ref();

        let mut position = sink.position();
        let mut extruder = 0;
        let mut estimated_seconds = 0.0;

        callback("layers", 0.0);
        for layer_index in 0..total {
            cancel.check()?;
            debug!("Writing layer {}/{}", layer_index + 1, total);
            sink.layer_comment(layer_index)?;

            let writer = LayerWriter::new(config, layer_index, support);
            let z = config.scaled_layer_z(layer_index);
            let mut planner = LayerPlanner::new(
                config,
                layer_index,
                z,
                config.scaled_thickness_for_layer(layer_index),
                position,
                extruder,
            );
            if layer_index == 0 && config.retraction_z_hop > 0.0 {
                planner.force_retract();
            }

            if layer_index == 0 {
                writer.queue_skirt(&mut planner, skirt, brim);
            }

            let mut printed_support = false;
            let mut printed_interface = false;
            for stack in stacks.iter() {
                cancel.check()?;
                writer.queue_extruder_layer(&mut planner, stack, wipe_tower.as_mut());
                if let Some(support) = support {
                    if config.support_extruder == stack.extruder {
                        writer.queue_normal_support(&mut planner, support, stack.extruder, wipe_tower.as_mut());
                        printed_support = true;
                    }
                    if config.support_interface_extruder == stack.extruder {
                        writer.queue_interface_support(&mut planner, support, stack.extruder, wipe_tower.as_mut());
                        printed_interface = true;
                    }
                }
            }

            if let Some(tower) = wipe_tower.as_mut() {
                tower.ensure_solid(&mut planner, writer.styles.wipe_tower);
            }

            if let Some(support) = support {
                // Support extruders without a model of their own.
                if !printed_support {
                    writer.queue_normal_support(
                        &mut planner,
                        support,
                        config.support_extruder,
                        wipe_tower.as_mut(),
                    );
                }
                if !printed_interface {
                    writer.queue_interface_support(
                        &mut planner,
                        support,
                        config.support_interface_extruder,
                        wipe_tower.as_mut(),
                    );
                }

                if writer.splits_on_support() {
                    planner.set_z(z + scale(config.support_air_gap));
                    let here = planner.last_position();
                    planner.queue_travel(here);
                    for stack in stacks.iter() {
                        writer.queue_air_gapped_layer(&mut planner, stack, wipe_tower.as_mut());
                    }
                    if !support.air_gapped_bottom_areas(layer_index).is_empty() {
                        writer.switch_extruder(&mut planner, config.support_extruder, wipe_tower.as_mut());
                        support.queue_air_gapped_bottom_layer(&mut planner, writer.styles.air_gapped_bottom);
                    }
                }
            }

            let speed_factor =
                planner.force_minimum_layer_time(config.minimum_layer_time, config.minimum_print_speed);
            let fan = fan_speed_percent(config, layer_index, speed_factor);
            let bridge_fan = if layer_index < config.first_layer_to_allow_fan {
                0
            } else {
                config.bridge_fan_speed
            };

            if !config.continuous_spiral_outer_perimeter && layer_index > 0 && layer_index + 2 < total {
                if let Some(stack) = stacks.first() {
                    writer.move_to_next_seam(&mut planner, stack, config.scaled_layer_z(layer_index + 1));
                }
            }

            let (travel, extrude) = planner.time_estimates();
            estimated_seconds += travel + extrude;
            planner.write_queued(sink, fan, bridge_fan)?;

            position = planner.last_position();
            extruder = planner.extruder();
            callback("layers", (layer_index + 1) as f64 / total.max(1) as f64);
        }

        sink.set_fan(0)?;
        if !config.end_code.is_empty() {
            sink.write_raw(&config.end_code)?;
        }
        sink.finish()?;

        info!(
            "Wrote {} layers in {:.2}s (estimated print time {:.0}s)",
            total,
            started.elapsed().as_secs_f64(),
            estimated_seconds
        );
        Ok(PrintSummary {
            layers: total,
            extruders: stacks.len(),
            with_support: support.is_some(),
            estimated_seconds,
        })
    }
}

/// Whether a path may rest on support material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SupportWrite {
    /// Parts over the model or over air, printed at layer height.
    Unsupported,
    /// Parts over support, printed above the air gap.
    Supported,
}

/// Fill paths of one island on one layer.
#[derive(Debug, Default)]
struct IslandFill {
    bridge: Vec<Polyline>,
    bottom: Vec<Polyline>,
    top: Vec<Polyline>,
    solid: Vec<Polyline>,
    sparse: Vec<InfillPath>,
}

/// Queues one layer's paths into a planner.
struct LayerWriter<'a> {
    config: &'a PrintConfig,
    support: Option<&'a SupportAreas>,
    layer_index: usize,
    /// Top of the layer, before any air-gap lift.
    z: Coord,
    styles: PathStyles,
    width: Coord,
    extend: Coord,
    /// The outer wall of this layer is one rising spiral.
    spiral: bool,
}

impl<'a> LayerWriter<'a> {
    fn new(config: &'a PrintConfig, layer_index: usize, support: Option<&'a SupportAreas>) -> Self {
        Self {
            config,
            support,
            layer_index,
            z: config.scaled_layer_z(layer_index),
            styles: PathStyles::for_layer(config, layer_index),
            width: config.scaled_width_for_layer(layer_index),
            extend: scale(config.infill_extend_into_perimeter),
            spiral: config.continuous_spiral_outer_perimeter && layer_index >= config.bottom_layers,
        }
    }

    /// Paths are split against support only above the first layer, outside
    /// spiral mode.
    fn splits_on_support(&self) -> bool {
        self.support.is_some() && self.layer_index > 0 && !self.config.continuous_spiral_outer_perimeter
    }

    /// Support of the layer below, grown by half a line.
    fn support_below(&self, line_width: Coord) -> Option<PolygonSet> {
        if !self.splits_on_support() {
            return None;
        }
        let support = self.support?;
        let area = support
            .required_support_areas(self.layer_index - 1)
            .offset(line_width / 2);
        (!area.is_empty()).then_some(area)
    }

    fn queue_skirt(&self, planner: &mut LayerPlanner, skirt: &[Polygon], brim: &[Polygon]) {
        let lowest = skirt
            .iter()
            .flat_map(|p| p.points().iter())
            .min_by_key(|p| (p.y, p.x));
        if let Some(&lowest) = lowest {
            planner.queue_travel(lowest);
        }
        planner.queue_polygons_by_optimizer(skirt, self.styles.skirt);
        planner.queue_polygons_by_optimizer(brim, self.styles.skirt);
    }

    /// Switch to `extruder`, priming on the wipe tower if it changed.
    fn switch_extruder(&self, planner: &mut LayerPlanner, extruder: usize, tower: Option<&mut WipeTower>) {
        if !planner.set_extruder(extruder) {
            return;
        }
        let Some(tower) = tower else {
            return;
        };
        // The tower stays at layer height through the air-gap pass.
        let z = planner.z();
        planner.set_z(self.z);
        tower.prime(planner, self.styles.wipe_tower);
        planner.queue_travel(tower.wipe_point());
        planner.set_z(z);
    }

    fn queue_normal_support(
        &self,
        planner: &mut LayerPlanner,
        support: &SupportAreas,
        extruder: usize,
        tower: Option<&mut WipeTower>,
    ) {
        if support.normal_support_areas(self.layer_index).is_empty() {
            return;
        }
        self.switch_extruder(planner, extruder, tower);
        support.queue_normal_support_layer(planner, self.styles.support);
    }

    fn queue_interface_support(
        &self,
        planner: &mut LayerPlanner,
        support: &SupportAreas,
        extruder: usize,
        tower: Option<&mut WipeTower>,
    ) {
        if support.interface_support_areas(self.layer_index).is_empty() {
            return;
        }
        self.switch_extruder(planner, extruder, tower);
        support.queue_interface_support_layer(planner, self.styles.support_interface);
    }

    /// Island indices in print order from the planner's position.
    fn island_order(&self, planner: &LayerPlanner, layer: &Layer) -> Vec<usize> {
        let starts: Vec<Point> = layer
            .islands
            .iter()
            .map(|island| island.start_point().unwrap_or(island.bounding_box.min))
            .collect();
        let mut order = PathOrderOptimizer::new(planner.last_position()).order_points(&starts);
        if self.config.continuous_spiral_outer_perimeter {
            order.truncate(1);
        }
        order
    }

    fn set_travel_rules(&self, planner: &mut LayerPlanner, island: &Island) {
        if self.config.avoid_crossing_perimeters {
            planner.set_avoid_crossing_boundary(Some(&island.avoid_crossing_boundary));
        } else {
            planner.set_always_retract(true);
        }
    }

    fn island_fill(&self, island: &Island, below: Option<&Layer>) -> IslandFill {
        let config = self.config;
        let angle = config.infill_starting_angle;
        let mut fill = IslandFill::default();

        for part in island.solid_bottom.split_into_islands() {
            let bridge = match below {
                Some(layer) if self.support.is_none() => bridge_angle(&part, &layer.outline, self.width),
                _ => None,
            };
            match bridge {
                Some(bridge) => fill.bridge.extend(generate_line_paths(&part, self.width, 0, bridge)),
                None => fill
                    .bottom
                    .extend(generate_line_paths(&part, self.width, self.extend, angle)),
            }
        }

        fill.top = generate_line_paths(&island.solid_top, self.width, self.extend, angle);
        let solid_angle = angle + 90.0 * (self.layer_index % 2) as CoordF;
        fill.solid = generate_line_paths(&island.solid_infill, self.width, self.extend, solid_angle);
        fill.sparse = generate_infill(
            config.infill_pattern,
            &island.sparse_infill,
            self.width,
            config.infill_percent,
            angle,
            self.extend,
            self.layer_index,
        );
        fill
    }

    fn queue_extruder_layer(&self, planner: &mut LayerPlanner, stack: &LayerStack, tower: Option<&mut WipeTower>) {
        let Some(layer) = stack.layers.get(self.layer_index) else {
            return;
        };
        if layer.is_empty() {
            return;
        }
        self.switch_extruder(planner, stack.extruder, tower);
        let below = self
            .layer_index
            .checked_sub(1)
            .and_then(|i| stack.layers.get(i));

        for (order, index) in self.island_order(planner, layer).into_iter().enumerate() {
            let island = &layer.islands[index];
            self.set_travel_rules(planner, island);
            let fill = self.island_fill(island, below);

            self.queue_lines_considering_support(planner, &fill.bridge, self.styles.bridge);

            if self.config.perimeters > 0 {
                if order > 0 && self.config.retract_when_changing_islands {
                    planner.force_retract();
                }
                self.queue_walls(planner, island);
            }

            planner.queue_infill(&fill.sparse, self.styles.fill);
            planner.queue_lines_by_optimizer(&fill.solid, self.styles.solid_fill);
            self.queue_lines_considering_support(planner, &fill.bottom, self.styles.bottom_fill);
            planner.queue_lines_by_optimizer(&fill.top, self.styles.top_fill);

            if !self.spiral {
                planner.move_inside_the_outer_perimeter(&island.outline, self.width * 2);
            }
        }
        planner.set_avoid_crossing_boundary(None);
    }

    fn queue_walls(&self, planner: &mut LayerPlanner, island: &Island) {
        let Some(outer) = island.insets.first() else {
            return;
        };
        if self.spiral {
            // The spiral travels to its own start below the layer top.
            if let Some(first) = outer.first() {
                planner.queue_polygons_by_optimizer(
                    std::slice::from_ref(first),
                    self.styles.outer_perimeter.spiralized(),
                );
            }
            return;
        }
        if let Some(first) = outer.first() {
            if let Some(&seam) = first.points().get(best_edge_index(first)) {
                planner.queue_travel(seam);
            }
        }

        let count = island.insets.len();
        let rings: Vec<usize> = if self.config.outside_perimeters_first || self.layer_index == 0 {
            (0..count).collect()
        } else {
            (0..count).rev().collect()
        };
        for ring in rings {
            let style = if ring == 0 {
                self.styles.outer_perimeter
            } else {
                self.styles.inner_perimeter
            };
            self.queue_polygons_considering_support(planner, &island.insets[ring], style);
        }
    }

    /// Model resting on support, printed after the layer's regular paths with
    /// Z raised by the air gap. Extruders with nothing on support are left
    /// alone.
    fn queue_air_gapped_layer(&self, planner: &mut LayerPlanner, stack: &LayerStack, tower: Option<&mut WipeTower>) {
        let Some(layer) = stack.layers.get(self.layer_index) else {
            return;
        };
        if layer.is_empty() {
            return;
        }
        let style = self.styles.air_gapped_bottom;
        let Some(area) = self.support_below(style.line_width) else {
            return;
        };
        let paths: Vec<Vec<Vec<Polyline>>> = layer
            .islands
            .iter()
            .map(|island| self.air_gapped_paths(island, &area))
            .collect();
        if paths.iter().flatten().all(Vec::is_empty) {
            return;
        }

        self.switch_extruder(planner, stack.extruder, tower);
        for index in self.island_order(planner, layer) {
            self.set_travel_rules(planner, &layer.islands[index]);
            for lines in &paths[index] {
                planner.queue_lines_by_optimizer(lines, style.open());
            }
        }
        planner.set_avoid_crossing_boundary(None);
    }

    /// Wall rings (inner first, outer last) and bottom skin of `island`
    /// that lie over `area`.
    fn air_gapped_paths(&self, island: &Island, area: &PolygonSet) -> Vec<Vec<Polyline>> {
        let rings = (1..island.insets.len()).chain((!island.insets.is_empty()).then_some(0));
        let mut paths: Vec<Vec<Polyline>> = rings
            .map(|ring| {
                let loops: Vec<Polyline> = island.insets[ring].iter().cloned().map(Polyline::from).collect();
                split_by_support(&loops, area, SupportWrite::Supported)
            })
            .collect();
        let bottom = generate_line_paths(
            &island.solid_bottom,
            self.width,
            self.extend,
            self.config.infill_starting_angle,
        );
        paths.push(split_by_support(&bottom, area, SupportWrite::Supported));
        paths
    }

    /// Print `polygons`, leaving out the parts over support below.
    fn queue_polygons_considering_support(&self, planner: &mut LayerPlanner, polygons: &[Polygon], style: PathStyle) {
        match self.support_below(style.line_width) {
            Some(area) => {
                let lines: Vec<Polyline> = polygons.iter().cloned().map(Polyline::from).collect();
                let kept = split_by_support(&lines, &area, SupportWrite::Unsupported);
                planner.queue_lines_by_optimizer(&kept, style.open());
            }
            None => planner.queue_polygons_by_optimizer(polygons, style),
        }
    }

    /// Print `lines`, leaving out the parts over support below.
    fn queue_lines_considering_support(&self, planner: &mut LayerPlanner, lines: &[Polyline], style: PathStyle) {
        if lines.is_empty() {
            return;
        }
        match self.support_below(style.line_width) {
            Some(area) => {
                let kept = split_by_support(lines, &area, SupportWrite::Unsupported);
                planner.queue_lines_by_optimizer(&kept, style);
            }
            None => planner.queue_lines_by_optimizer(lines, style),
        }
    }

    /// Travel to the seam of the next layer while still at this layer's
    /// height, then rise. Only when the next layer has a single island.
    fn move_to_next_seam(&self, planner: &mut LayerPlanner, stack: &LayerStack, next_z: Coord) {
        let Some(next) = stack.layers.get(self.layer_index + 1) else {
            return;
        };
        let [island] = next.islands.as_slice() else {
            return;
        };
        let Some(ring) = island.insets.first().and_then(|r| r.first()) else {
            return;
        };
        let Some(&seam) = ring.points().get(best_edge_index(ring)) else {
            return;
        };
        planner.set_avoid_crossing_boundary(Some(&island.avoid_crossing_boundary));
        planner.queue_travel(seam);
        planner.set_z(next_z);
        planner.queue_travel(seam);
        planner.set_avoid_crossing_boundary(None);
    }
}

/// The part of `lines` outside (`Unsupported`) or inside (`Supported`) `area`.
fn split_by_support(lines: &[Polyline], area: &PolygonSet, mode: SupportWrite) -> Vec<Polyline> {
    let segments: Vec<Line> = lines.iter().flat_map(Polyline::edges).collect();
    let kept = match mode {
        SupportWrite::Unsupported => area.clip_lines_outside(&segments),
        SupportWrite::Supported => area.clip_lines(&segments),
    };
    chain_segments(kept)
}
