//! HLSL-specific IR adaptation.
//!
//! Combined image samplers split back into a texture object and a sampler
//! object: the declaration becomes a pair of declarations, every reference to
//! the combined variable is renamed to the texture, and the writer receives a
//! map from texture to sampler so sample calls can name both.

use crate::arena::{Arena, Handle};
use crate::ir::{Stmt, Variable, VarFlags};
use crate::xform::{copy_stmt, Subst, Tree, TreeRef};
use crate::FastHashMap;

/// Texture variable to the sampler it was split from.
pub type SamplerMap = FastHashMap<Handle<Variable>, Handle<Variable>>;

/// Rewrite `src` into the forms the HLSL writer prints directly.
pub fn adapt(src: TreeRef, variables: &mut Arena<Variable>) -> (Tree, SamplerMap) {
    let mut subst = Subst::default();
    let mut samplers = SamplerMap::default();
    let mut splits = FastHashMap::default();

    // Pass 1: find combined declarations and mint the split variables.
    collect_splits(src, variables, src.root, &mut subst, &mut samplers, &mut splits);

    // Pass 2: copy the tree, replacing each combined declaration with its
    // texture + sampler pair and renaming identifier uses.
    let mut exprs = Arena::new();
    let mut stmts = Arena::new();
    let root = rewrite(src, &mut exprs, &mut stmts, &subst, &splits, src.root);
    (Tree { exprs, stmts, root }, samplers)
}

struct Split {
    texture: Handle<Variable>,
    sampler: Handle<Variable>,
    binding: u32,
    set: u32,
}

fn collect_splits(
    src: TreeRef,
    variables: &mut Arena<Variable>,
    stmt: Handle<Stmt>,
    subst: &mut Subst,
    samplers: &mut SamplerMap,
    splits: &mut FastHashMap<Handle<Stmt>, Split>,
) {
    match src.stmts[stmt] {
        Stmt::Container(ref block) | Stmt::Compound(ref block) => {
            for &child in block {
                collect_splits(src, variables, child, subst, samplers, splits);
            }
        }
        Stmt::CombinedImageDecl { var, binding, set } => {
            let combined = variables[var].clone();
            log::debug!("splitting combined image sampler [{}]", combined.name);
            let texture = variables.append(Variable {
                id: combined.id,
                name: format!("{}_texture", combined.name),
                ty: combined.ty,
                flags: combined.flags,
                outer: None,
                builtin: None,
            });
            let sampler = variables.append(Variable {
                id: combined.id,
                name: format!("{}_sampler", combined.name),
                ty: combined.ty,
                flags: combined.flags | VarFlags::SAMPLER,
                outer: None,
                builtin: None,
            });
            subst.vars.insert(var, texture);
            samplers.insert(texture, sampler);
            splits.insert(
                stmt,
                Split {
                    texture,
                    sampler,
                    binding,
                    set,
                },
            );
        }
        _ => {}
    }
}

fn rewrite(
    src: TreeRef,
    exprs: &mut Arena<crate::ir::Expr>,
    stmts: &mut Arena<Stmt>,
    subst: &Subst,
    splits: &FastHashMap<Handle<Stmt>, Split>,
    stmt: Handle<Stmt>,
) -> Handle<Stmt> {
    match src.stmts[stmt] {
        Stmt::Container(ref block) => {
            let block = block.clone();
            let mut out = Vec::new();
            for child in block {
                if let Some(split) = splits.get(&child) {
                    out.push(stmts.append(Stmt::SampledImageDecl {
                        var: split.texture,
                        binding: split.binding,
                        set: split.set,
                    }));
                    out.push(stmts.append(Stmt::SamplerDecl {
                        var: split.sampler,
                        binding: split.binding,
                        set: split.set,
                    }));
                } else {
                    out.push(rewrite(src, exprs, stmts, subst, splits, child));
                }
            }
            stmts.append(Stmt::Container(out))
        }
        _ => copy_stmt(src, exprs, stmts, subst, stmt),
    }
}
