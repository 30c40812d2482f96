use crate::{
    component::ComponentInstance,
    host::{HostOps, Namespace},
    node::{Children, Key, PatchFlags, VNode},
    renderer::Renderer,
};
use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};
use std::rc::Rc;

impl<H: HostOps> Renderer<H> {
    /// Reconciles two generations of children. Three branches on the new
    /// children's kind (text / nodes / none) against the old kind; two
    /// node lists go through the keyed or unkeyed diff.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn patch_children(
        self: &Rc<Self>,
        n1: &VNode<H::Node>,
        n2: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
        optimized: bool,
    ) {
        match (n1.children(), n2.children()) {
            (old, Children::Text(text)) => {
                if let Children::Nodes(old_children) = old {
                    self.unmount_children(old_children, parent, true);
                }
                if old.as_text() != Some(text.as_str()) {
                    self.host.set_element_text(container, text);
                }
            }
            (Children::Text(_), Children::Nodes(new_children)) => {
                self.host.set_element_text(container, "");
                self.mount_children(
                    new_children,
                    container,
                    anchor,
                    parent,
                    namespace,
                    optimized,
                );
            }
            (Children::Text(_), Children::None) => {
                self.host.set_element_text(container, "");
            }
            (Children::Nodes(old_children), Children::Nodes(new_children)) => {
                let unkeyed = n2
                    .patch_flags()
                    .contains(PatchFlags::UNKEYED_FRAGMENT)
                    || (!n2
                        .patch_flags()
                        .contains(PatchFlags::KEYED_FRAGMENT)
                        && new_children.iter().all(|c| c.key().is_none()));
                if unkeyed {
                    self.patch_unkeyed_children(
                        old_children,
                        new_children,
                        container,
                        anchor,
                        parent,
                        namespace,
                        optimized,
                    );
                } else {
                    self.patch_keyed_children(
                        old_children,
                        new_children,
                        container,
                        anchor,
                        parent,
                        namespace,
                        optimized,
                    );
                }
            }
            (Children::Nodes(old_children), Children::None) => {
                self.unmount_children(old_children, parent, true);
            }
            (Children::None, Children::Nodes(new_children)) => {
                self.mount_children(
                    new_children,
                    container,
                    anchor,
                    parent,
                    namespace,
                    optimized,
                );
            }
            (Children::None, Children::None) => {}
        }
    }

    /// Position-by-position patch of the common prefix, then mount or
    /// unmount the tail.
    #[allow(clippy::too_many_arguments)]
    fn patch_unkeyed_children(
        self: &Rc<Self>,
        old_children: &[VNode<H::Node>],
        new_children: &[VNode<H::Node>],
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
        optimized: bool,
    ) {
        let common = old_children.len().min(new_children.len());
        for i in 0..common {
            self.patch(
                Some(&old_children[i]),
                &new_children[i],
                container,
                None,
                parent,
                namespace,
                optimized,
            );
        }
        if old_children.len() > common {
            self.unmount_children(&old_children[common..], parent, true);
        } else {
            self.mount_children(
                &new_children[common..],
                container,
                anchor,
                parent,
                namespace,
                optimized,
            );
        }
    }

    /// The keyed diff: trim matching heads and tails, then reorder the
    /// middle with the fewest moves by keeping the longest increasing
    /// subsequence of reused nodes in place.
    #[allow(clippy::too_many_arguments)]
    fn patch_keyed_children(
        self: &Rc<Self>,
        old_children: &[VNode<H::Node>],
        new_children: &[VNode<H::Node>],
        container: &H::Node,
        parent_anchor: Option<&H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
        optimized: bool,
    ) {
        let mut i = 0usize;
        let mut e1 = old_children.len() as isize - 1;
        let mut e2 = new_children.len() as isize - 1;

        // 1. sync from the head
        while (i as isize) <= e1 && (i as isize) <= e2 {
            let n1 = &old_children[i];
            let n2 = &new_children[i];
            if !n1.same_node_type(n2) {
                break;
            }
            self.patch(
                Some(n1), n2, container, None, parent, namespace, optimized,
            );
            i += 1;
        }

        // 2. sync from the tail
        while (i as isize) <= e1 && (i as isize) <= e2 {
            let n1 = &old_children[e1 as usize];
            let n2 = &new_children[e2 as usize];
            if !n1.same_node_type(n2) {
                break;
            }
            self.patch(
                Some(n1), n2, container, None, parent, namespace, optimized,
            );
            e1 -= 1;
            e2 -= 1;
        }

        if (i as isize) > e1 {
            // 3. only additions remain
            if (i as isize) <= e2 {
                let next_pos = (e2 + 1) as usize;
                let anchor = if next_pos < new_children.len() {
                    new_children[next_pos].el()
                } else {
                    parent_anchor.cloned()
                };
                for j in i..=(e2 as usize) {
                    self.patch(
                        None,
                        &new_children[j],
                        container,
                        anchor.as_ref(),
                        parent,
                        namespace,
                        optimized,
                    );
                }
            }
        } else if (i as isize) > e2 {
            // 4. only removals remain
            for j in i..=(e1 as usize) {
                self.unmount(&old_children[j], parent, true);
            }
        } else {
            // 5. the unknown middle
            let s1 = i;
            let s2 = i;

            // 5.1 key → new index for the new middle; the first-seen
            // mapping wins on duplicates
            let mut key_to_new_index: FxHashMap<&Key, usize> =
                FxHashMap::default();
            for j in s2..=(e2 as usize) {
                if let Some(key) = new_children[j].key() {
                    if key_to_new_index.contains_key(key) {
                        crate::debug_warn!(
                            "duplicate key {key:?} in a keyed list; \
                             children must have unique keys"
                        );
                    } else {
                        key_to_new_index.insert(key, j);
                    }
                }
            }

            // 5.2 walk the old middle: patch matches in place, unmount
            // the rest, and record where each reused node landed
            let to_be_patched = e2 as usize - s2 + 1;
            let mut patched = 0usize;
            // 0 means "no old counterpart: mount"
            let mut new_index_to_old_index: SmallVec<[usize; 16]> =
                smallvec![0usize; to_be_patched];
            let mut moved = false;
            let mut max_new_index_so_far = 0usize;

            for j in s1..=(e1 as usize) {
                let prev_child = &old_children[j];
                if patched >= to_be_patched {
                    self.unmount(prev_child, parent, true);
                    continue;
                }
                let new_index = match prev_child.key() {
                    Some(key) => key_to_new_index.get(key).copied(),
                    None => {
                        // unkeyed item inside a keyed list: take the
                        // first unmatched node of the same type
                        (s2..=(e2 as usize)).find(|&k| {
                            new_index_to_old_index[k - s2] == 0
                                && prev_child
                                    .same_node_type(&new_children[k])
                        })
                    }
                };
                match new_index {
                    None => self.unmount(prev_child, parent, true),
                    Some(new_index) => {
                        new_index_to_old_index[new_index - s2] = j + 1;
                        if new_index >= max_new_index_so_far {
                            max_new_index_so_far = new_index;
                        } else {
                            moved = true;
                        }
                        self.patch(
                            Some(prev_child),
                            &new_children[new_index],
                            container,
                            None,
                            parent,
                            namespace,
                            optimized,
                        );
                        patched += 1;
                    }
                }
            }

            // 5.3 mount and move, walking backwards so each placed node
            // anchors the one before it
            let increasing = if moved {
                longest_increasing_subsequence(&new_index_to_old_index)
            } else {
                Vec::new()
            };
            let mut lis_cursor = increasing.len() as isize - 1;
            for j in (0..to_be_patched).rev() {
                let next_index = s2 + j;
                let next_child = &new_children[next_index];
                let anchor = if next_index + 1 < new_children.len() {
                    new_children[next_index + 1].el()
                } else {
                    parent_anchor.cloned()
                };
                if new_index_to_old_index[j] == 0 {
                    self.patch(
                        None,
                        next_child,
                        container,
                        anchor.as_ref(),
                        parent,
                        namespace,
                        optimized,
                    );
                } else if moved {
                    if lis_cursor < 0
                        || j != increasing[lis_cursor as usize]
                    {
                        self.move_node(
                            next_child,
                            container,
                            anchor.as_ref(),
                        );
                    } else {
                        lis_cursor -= 1;
                    }
                }
            }
        }
    }
}

/// Indices of a longest increasing subsequence of `arr`, patience-sort
/// style with predecessor-chain reconstruction. Zeros mark fresh mounts
/// and are skipped; they never move.
pub(crate) fn longest_increasing_subsequence(arr: &[usize]) -> Vec<usize> {
    let mut predecessors = vec![0usize; arr.len()];
    let mut result: Vec<usize> = Vec::new();
    for (index, &value) in arr.iter().enumerate() {
        if value == 0 {
            continue;
        }
        if let Some(&last) = result.last() {
            if arr[last] < value {
                predecessors[index] = last;
                result.push(index);
                continue;
            }
        } else {
            result.push(index);
            continue;
        }
        // binary search for the first tail not less than value
        let mut lo = 0usize;
        let mut hi = result.len() - 1;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if arr[result[mid]] < value {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if value < arr[result[lo]] {
            if lo > 0 {
                predecessors[index] = result[lo - 1];
            }
            result[lo] = index;
        }
    }
    // walk the predecessor chain backwards from the final tail
    let mut cursor = result.len();
    if cursor == 0 {
        return result;
    }
    let mut last = result[cursor - 1];
    while cursor > 0 {
        cursor -= 1;
        result[cursor] = last;
        last = predecessors[last];
    }
    result
}

#[cfg(test)]
mod tests {
    use super::longest_increasing_subsequence;

    #[test]
    fn empty_and_all_zero_inputs() {
        assert!(longest_increasing_subsequence(&[]).is_empty());
        assert!(longest_increasing_subsequence(&[0, 0, 0]).is_empty());
    }

    #[test]
    fn already_increasing() {
        assert_eq!(
            longest_increasing_subsequence(&[1, 2, 3, 4]),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn classic_middle_reorder() {
        // old positions of [c, d, b] (1-based): LIS keeps c, d
        assert_eq!(longest_increasing_subsequence(&[3, 4, 2]), vec![0, 1]);
    }

    #[test]
    fn zeros_are_skipped() {
        // zeros are mounts; the subsequence forms around them
        assert_eq!(
            longest_increasing_subsequence(&[5, 0, 3, 4, 0, 9]),
            vec![2, 3, 5]
        );
    }

    #[test]
    fn strictly_decreasing_keeps_one() {
        assert_eq!(longest_increasing_subsequence(&[9, 7, 5, 3]).len(), 1);
    }

    #[test]
    fn interleaved_sequence() {
        let input = [2, 1, 5, 3, 6, 4, 8, 9, 7];
        let lis = longest_increasing_subsequence(&input);
        let values: Vec<usize> = lis.iter().map(|&i| input[i]).collect();
        assert_eq!(values, vec![1, 3, 4, 8, 9]);
    }
}
