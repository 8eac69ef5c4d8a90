//! Plan synthesis
//!
//! Turns a solved equation into an ordered list of [`ShapeOp`]s. The plan is
//! built in five fixed steps, each skipped when it would do nothing:
//!
//! 1. reshape the input so that every left index owns one axis (left groups
//!    are split, left `1` axes are dropped)
//! 2. reshape to insert a size-1 axis for every right `1` and every tiling
//!    index
//! 3. transpose into right-hand order
//! 4. tile the inserted tiling axes up to their sizes
//! 5. reshape to merge right-hand groups
//!
//! Grouping and ungrouping are only ever expressed as reshapes, and axis
//! reordering only as transposes.

use crate::ast::{Atom, Element};
use crate::config::PlannerConfig;
use crate::error::{CompileError, CompileResult};
use crate::ops::{checked_product, format_shape, Plan, ReshapeDim, ShapeOp};
use crate::resolver::ResolvedEquation;
use crate::solver::SizeAssignment;

/// Identity of a logical axis that exists on both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Index(char),
    /// The k-th axis covered by the ellipsis
    Batch(usize),
}

/// One factor of a physical axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Label(Label),
    /// Literal `1`
    Unit,
    /// Tiling index that has not been tiled yet; size 1 until step 4
    Fresh(char),
}

/// Physical axes, each the row-major product of its slots
type Layout = Vec<Vec<Slot>>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum StepKind {
    Reshape,
    Transpose(Vec<usize>),
    Tile(Vec<usize>),
}

/// A synthesis step and the layout it leaves behind
#[derive(Debug, Clone)]
struct Step {
    kind: StepKind,
    layout: Layout,
}

impl Step {
    fn new(kind: StepKind, layout: Layout) -> Self {
        Self { kind, layout }
    }
}

fn singletons(slots: &[Slot]) -> Layout {
    slots.iter().map(|slot| vec![*slot]).collect()
}

/// Labels per axis; `1` axes and untiled axes only count by position.
fn signature(layout: &[Vec<Slot>]) -> Vec<Vec<Label>> {
    layout
        .iter()
        .map(|axis| {
            axis.iter()
                .filter_map(|slot| match slot {
                    Slot::Label(label) => Some(*label),
                    Slot::Unit | Slot::Fresh(_) => None,
                })
                .collect()
        })
        .collect()
}

fn batches(span: usize) -> impl Iterator<Item = Slot> {
    (0..span).map(|k| Slot::Label(Label::Batch(k)))
}

fn left_layout(elements: &[Element], span: usize) -> Layout {
    let mut layout = Vec::new();
    for element in elements {
        match element {
            Element::Index(index) => layout.push(vec![Slot::Label(Label::Index(*index))]),
            Element::Unit => layout.push(vec![Slot::Unit]),
            Element::Ellipsis => layout.extend(batches(span).map(|slot| vec![slot])),
            Element::Group(atoms) => layout.push(
                atoms
                    .iter()
                    .flat_map(|atom| match atom {
                        Atom::Index(index) => vec![Slot::Label(Label::Index(*index))],
                        Atom::Ellipsis => batches(span).collect(),
                    })
                    .collect(),
            ),
        }
    }
    layout
}

/// Right-hand axes, with tiling indices still marked [`Slot::Fresh`].
fn right_layout(elements: &[Element], span: usize, resolved: &ResolvedEquation) -> Layout {
    let slot = |index: char| {
        if resolved.is_tiled(index) {
            Slot::Fresh(index)
        } else {
            Slot::Label(Label::Index(index))
        }
    };

    let mut layout = Vec::new();
    for element in elements {
        match element {
            Element::Index(index) => layout.push(vec![slot(*index)]),
            Element::Unit => layout.push(vec![Slot::Unit]),
            Element::Ellipsis => layout.extend(batches(span).map(|slot| vec![slot])),
            Element::Group(atoms) => layout.push(
                atoms
                    .iter()
                    .flat_map(|atom| match atom {
                        Atom::Index(index) => vec![slot(*index)],
                        Atom::Ellipsis => batches(span).collect(),
                    })
                    .collect(),
            ),
        }
    }
    layout
}

fn tiled(slot: Slot) -> Slot {
    match slot {
        Slot::Fresh(index) => Slot::Label(Label::Index(index)),
        other => other,
    }
}

fn slot_size(slot: &Slot, sizes: &SizeAssignment) -> Option<usize> {
    match slot {
        Slot::Label(Label::Index(index)) => sizes.index(*index),
        Slot::Label(Label::Batch(k)) => sizes.ellipsis().get(*k).copied().flatten(),
        Slot::Unit | Slot::Fresh(_) => Some(1),
    }
}

/// Writes an axis the way it appears in an equation: `j`, `(jk)`, `1`
fn axis_label(axis: &[Slot]) -> String {
    let inner: String = axis
        .iter()
        .map(|slot| match slot {
            Slot::Label(Label::Index(index)) | Slot::Fresh(index) => index.to_string(),
            Slot::Label(Label::Batch(k)) => format!("...{}", k),
            Slot::Unit => "1".to_string(),
        })
        .collect();
    if axis.len() == 1 {
        inner
    } else {
        format!("({})", inner)
    }
}

fn describe(layout: &[Vec<Slot>]) -> String {
    let axes: Vec<String> = layout.iter().map(|axis| axis_label(axis)).collect();
    format!("[{}]", axes.join(", "))
}

/// Size of every axis. Unknown factors make the axis unknown; a known
/// product that does not fit in `usize` is an error.
fn axis_sizes(layout: &[Vec<Slot>], sizes: &SizeAssignment) -> CompileResult<Vec<Option<usize>>> {
    layout
        .iter()
        .map(|axis| {
            let factors: Vec<Option<usize>> = axis.iter().map(|slot| slot_size(slot, sizes)).collect();
            if factors.iter().any(Option::is_none) {
                return Ok(None);
            }
            checked_product(factors)
                .map(Some)
                .ok_or_else(|| CompileError::overflow(axis_label(axis)))
        })
        .collect()
}

/// Builds [`Plan`]s from solved equations
#[derive(Debug, Clone, Default)]
pub struct PlanSynthesizer {
    config: PlannerConfig,
}

impl PlanSynthesizer {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn synthesize(
        &self,
        resolved: &ResolvedEquation,
        sizes: &SizeAssignment,
    ) -> CompileResult<Plan> {
        let equation = resolved.equation();
        let span = sizes.ellipsis().len();

        let input = left_layout(&equation.left, span);
        let right = right_layout(&equation.right, span, resolved);
        let output: Layout = right
            .iter()
            .map(|axis| axis.iter().copied().map(tiled).collect())
            .collect();

        let steps = self.steps(resolved, &input, &right, &output, sizes)?;
        let steps = if self.config.simplify {
            simplify(&input, steps)
        } else {
            steps
        };

        let ops = steps
            .iter()
            .map(|step| lower(step, sizes))
            .collect::<CompileResult<Vec<_>>>()?;

        let input_shape = axis_sizes(&input, sizes)?;
        let output_shape = axis_sizes(&output, sizes)?;
        if self.config.verify {
            verify_output(&ops, &input_shape, &output_shape)?;
        }

        tracing::debug!(
            equation = %equation,
            ops = ops.len(),
            output = %format_shape(&output_shape),
            "synthesized plan"
        );

        Ok(Plan {
            equation: equation.to_string(),
            input_shape,
            output_shape,
            ops,
        })
    }

    /// The five synthesis steps, before simplification
    fn steps(
        &self,
        resolved: &ResolvedEquation,
        input: &[Vec<Slot>],
        right: &[Vec<Slot>],
        output: &[Vec<Slot>],
        sizes: &SizeAssignment,
    ) -> CompileResult<Vec<Step>> {
        let equation = resolved.equation();
        let mut steps = Vec::new();

        let left: Vec<Label> = input
            .iter()
            .flatten()
            .filter_map(|slot| match slot {
                Slot::Label(label) => Some(*label),
                Slot::Unit | Slot::Fresh(_) => None,
            })
            .collect();
        let flat_right: Vec<Slot> = right.iter().flatten().copied().collect();

        // 1. One axis per left index.
        let ungroup = equation
            .left
            .iter()
            .any(|element| matches!(element, Element::Group(_) | Element::Unit));
        if ungroup {
            let layout = left.iter().map(|label| vec![Slot::Label(*label)]).collect();
            steps.push(Step::new(StepKind::Reshape, layout));
        }

        // 2.
        let widened = widen(&left, &flat_right)?;
        let widened_slots: Vec<Slot> = widened.iter().map(|(slot, _)| *slot).collect();
        if widened.len() > left.len() {
            steps.push(Step::new(StepKind::Reshape, singletons(&widened_slots)));
        }

        // 3. Output axis `i` is the widened axis that belongs at right position `i`.
        let mut perm = vec![0; widened.len()];
        for (axis, (_, position)) in widened.iter().enumerate() {
            if let Some(entry) = perm.get_mut(*position) {
                *entry = axis;
            }
        }
        if perm.iter().enumerate().any(|(i, &axis)| i != axis) {
            steps.push(Step::new(StepKind::Transpose(perm), singletons(&flat_right)));
        }

        // 4.
        let multiples = flat_right
            .iter()
            .map(|slot| match slot {
                Slot::Fresh(index) => sizes
                    .index(*index)
                    .ok_or(CompileError::MissingSize { index: *index }),
                Slot::Label(_) | Slot::Unit => Ok(1),
            })
            .collect::<CompileResult<Vec<usize>>>()?;
        if multiples.iter().any(|&m| m != 1) {
            let layout: Vec<Slot> = flat_right.iter().copied().map(tiled).collect();
            steps.push(Step::new(StepKind::Tile(multiples), singletons(&layout)));
        }

        // 5.
        let regroup = equation
            .right
            .iter()
            .any(|element| matches!(element, Element::Group(_)));
        if regroup {
            steps.push(Step::new(StepKind::Reshape, output.to_vec()));
        }

        for step in &steps {
            tracing::trace!(step = ?step.kind, layout = ?step.layout, "synthesis step");
        }
        Ok(steps)
    }
}

/// Places the new right-hand axes among the left labels: each lands after
/// the left labels that precede it on the right. Every entry carries its
/// position on the right.
fn widen(left: &[Label], flat_right: &[Slot]) -> CompileResult<Vec<(Slot, usize)>> {
    let mut anchored: Vec<Vec<(Slot, usize)>> = vec![Vec::new(); left.len() + 1];
    let mut seen = 0;
    for (position, slot) in flat_right.iter().enumerate() {
        match slot {
            Slot::Label(_) => seen += 1,
            Slot::Unit | Slot::Fresh(_) => anchored[seen.min(left.len())].push((*slot, position)),
        }
    }

    let mut widened = Vec::with_capacity(flat_right.len());
    for (anchor, inserted) in anchored.into_iter().enumerate() {
        widened.extend(inserted);
        if let Some(label) = left.get(anchor) {
            let position = flat_right
                .iter()
                .position(|slot| *slot == Slot::Label(*label))
                .ok_or_else(|| CompileError::UnreachableShape {
                    expected: describe(&singletons(flat_right)),
                    actual: describe(
                        &left.iter().map(|label| vec![Slot::Label(*label)]).collect::<Layout>(),
                    ),
                })?;
            widened.push((Slot::Label(*label), position));
        }
    }
    Ok(widened)
}

/// Collapse runs of reshapes into their last member and drop reshapes that
/// leave the axis structure unchanged.
fn simplify(input: &[Vec<Slot>], steps: Vec<Step>) -> Vec<Step> {
    let mut current = signature(input);
    let mut kept = Vec::with_capacity(steps.len());
    let mut steps = steps.into_iter().peekable();

    while let Some(step) = steps.next() {
        if step.kind == StepKind::Reshape {
            let followed_by_reshape = steps
                .peek()
                .map_or(false, |next| next.kind == StepKind::Reshape);
            if followed_by_reshape {
                tracing::trace!(layout = ?step.layout, "merged into following reshape");
                continue;
            }
            if signature(&step.layout) == current {
                tracing::trace!(layout = ?step.layout, "dropped no-op reshape");
                continue;
            }
        }
        current = signature(&step.layout);
        kept.push(step);
    }
    kept
}

fn lower(step: &Step, sizes: &SizeAssignment) -> CompileResult<ShapeOp> {
    match &step.kind {
        StepKind::Transpose(perm) => Ok(ShapeOp::Transpose { perm: perm.clone() }),
        StepKind::Tile(multiples) => Ok(ShapeOp::Tile {
            multiples: multiples.clone(),
        }),
        StepKind::Reshape => {
            let dims = axis_sizes(&step.layout, sizes)?;
            if dims.iter().filter(|size| size.is_none()).count() > 1 {
                return Err(CompileError::ShapeRequired {
                    target: format_shape(&dims),
                });
            }
            Ok(ShapeOp::Reshape {
                shape: dims
                    .into_iter()
                    .map(|size| size.map_or(ReshapeDim::Infer, ReshapeDim::Fixed))
                    .collect(),
            })
        }
    }
}

/// Replays `ops` over the input shape and checks the result
fn verify_output(
    ops: &[ShapeOp],
    input: &[Option<usize>],
    expected: &[Option<usize>],
) -> CompileResult<()> {
    let actual = ops
        .iter()
        .fold(input.to_vec(), |shape, op| op.transform_shape(&shape));
    if actual != expected {
        return Err(CompileError::UnreachableShape {
            expected: format_shape(expected),
            actual: format_shape(&actual),
        });
    }
    Ok(())
}
