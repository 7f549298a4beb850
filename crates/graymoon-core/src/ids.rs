//! Identifier types for GrayMoon entities.

crate::define_id! {
    /// Identifies a `Connector` (credentials + endpoint for one external system).
    pub struct ConnectorId("conn");
}

crate::define_id! {
    /// Identifies a `Repository`.
    pub struct RepositoryId("repo");
}

crate::define_id! {
    /// Identifies a `Workspace`.
    pub struct WorkspaceId("wksp");
}

crate::define_id! {
    /// Identifies a `WorkspaceRepositoryLink`.
    pub struct LinkId("link");
}

crate::define_id! {
    /// Identifies a `WorkspaceProject`.
    pub struct ProjectId("proj");
}

crate::define_id! {
    /// Identifies a `ProjectDependency` edge.
    pub struct DependencyEdgeId("edge");
}

crate::define_id! {
    /// Opaque request id correlating a `RequestCommand` with its `ResponseCommand`.
    pub struct RequestId("req");
}
