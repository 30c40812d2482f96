use crate::node::VNode;

/// A custom behavior attached to an element node, invoked at fixed points
/// of the element's life. All methods default to no-ops; implement the
/// ones the behavior needs.
///
/// Hook ordering on mount is `created` (element exists, detached),
/// `before_mount` (props applied), `mounted` (inserted, delivered in the
/// post-render phase). Updates bracket the element's children patch with
/// `before_update` / `updated`; unmounts mirror mounts.
pub trait Directive<N: 'static> {
    fn created(&self, _el: &N, _vnode: &VNode<N>) {}

    fn before_mount(&self, _el: &N, _vnode: &VNode<N>) {}

    fn mounted(&self, _el: &N, _vnode: &VNode<N>) {}

    fn before_update(&self, _el: &N, _vnode: &VNode<N>, _prev: &VNode<N>) {}

    fn updated(&self, _el: &N, _vnode: &VNode<N>, _prev: &VNode<N>) {}

    fn before_unmount(&self, _el: &N, _vnode: &VNode<N>) {}

    fn unmounted(&self, _el: &N, _vnode: &VNode<N>) {}
}
