use thiserror::Error;
use ultraviolet::vec::Vec3;

use crate::skinned::Bone;

#[derive(Debug, Error, PartialEq)]
pub enum HierarchyError {
	#[error("No bone with index {0}")]
	Bone(usize),
	#[error("Parent chain loops back on itself, starting from bone {bone}")]
	Cycle {
		bone: usize,
	},
	#[error("Bone {bone} has a parent out of range: {parent}")]
	Parent {
		bone: usize,
		parent: i32,
	},
}

/// Walks parent links of a bone list. Rotations are not applied.
#[derive(Clone, Copy, Debug)]
pub struct Hierarchy<'a> {
	bones: &'a [Bone],
}

impl<'a> Hierarchy<'a> {
	pub fn new(bones: &'a [Bone]) -> Hierarchy<'a> {
		Hierarchy {
			bones: bones,
		}
	}

	/// Indices from `bone` up to its root, both included.
	/// A forest never needs more steps than it has bones, so taking more is a cycle.
	pub fn chain(&self, bone: usize) -> Result<Vec<usize>, HierarchyError> {
		let mut current = self.bones.get(bone).ok_or(HierarchyError::Bone(bone))?;
		let mut chain = vec![bone];

		while current.parent >= 0 {
			if chain.len() >= self.bones.len() {
				return Err(HierarchyError::Cycle {
					bone: bone,
				});
			}

			let parent = current.parent as usize;
			current = self.bones.get(parent).ok_or(HierarchyError::Parent {
				bone: chain[chain.len() - 1],
				parent: current.parent,
			})?;
			chain.push(parent);
		}

		Ok(chain)
	}

	/// Sum of the local origins along the parent chain
	pub fn absolute_origin(&self, bone: usize) -> Result<Vec3, HierarchyError> {
		let chain = self.chain(bone)?;
		Ok(chain.iter().fold(Vec3::zero(), |acc, i| acc + self.bones[*i].origin))
	}

	/// Bones without a parent
	pub fn roots(&self) -> impl Iterator<Item = usize> + 'a {
		let bones = self.bones;
		bones.iter().enumerate().filter(|(_, b)| b.parent < 0).map(|(i, _)| i)
	}
}
