// src/core/orb/grpc.rs

//! The gRPC surface for the object store. The legacy byte-oriented
//! `PushData`/`FetchData`/`PushMeta`/`FetchMeta` methods are thin
//! wrappers around the typed records: a legacy push wraps its opaque
//! payload into an `OrbData` with subtype `@json` (falling back to a
//! plain string if the bytes aren't valid json), matching the retained
//! compatibility note carried over from the original service.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use uuid::Uuid;

use super::model::{OrbData, OrbDataSubtype, OrbMeta};
use super::proto::orb::{
    FetchByUuid, FetchById, FetchDataReply, FetchDataRequest, FetchMetaReply, FetchMetaRequest,
    OrbDataObject, OrbMetaObject, PushDataReply, PushDataRequest, PushMetaReply, PushMetaRequest,
    orb_server::Orb,
};
use super::storage::Storage;

pub struct OrbService {
    storage: Arc<Storage>,
}

impl OrbService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

fn parse_uuid(s: &str) -> Result<Option<Uuid>, Status> {
    if s.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(s)
        .map(Some)
        .map_err(|e| Status::invalid_argument(format!("invalid uuid: {e}")))
}

fn data_to_proto(d: &OrbData) -> OrbDataObject {
    OrbDataObject {
        u: d.u.map(|u| u.to_string()).unwrap_or_default(),
        subtype: d.subtype.as_str().to_string(),
        src: d.src.clone(),
        chain_left: d.chain_left.map(|u| u.to_string()),
        chain_right: d.chain_right.map(|u| u.to_string()),
        parent: d.parent.map(|u| u.to_string()),
        ctime: d.ctime,
        flags: d.flags.clone(),
        data_json: d.data.to_string(),
    }
}

fn proto_to_data(o: &OrbDataObject) -> Result<OrbData, Status> {
    let data: serde_json::Value = if o.data_json.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&o.data_json)
            .map_err(|e| Status::invalid_argument(format!("invalid data_json: {e}")))?
    };
    Ok(OrbData {
        u: parse_uuid(&o.u)?,
        subtype: OrbDataSubtype::parse(&o.subtype),
        src: o.src.clone(),
        chain_left: o.chain_left.as_deref().map(parse_uuid).transpose()?.flatten(),
        chain_right: o.chain_right.as_deref().map(parse_uuid).transpose()?.flatten(),
        parent: o.parent.as_deref().map(parse_uuid).transpose()?.flatten(),
        ctime: o.ctime,
        flags: o.flags.clone(),
        data,
    })
}

fn meta_to_proto(m: &OrbMeta) -> OrbMetaObject {
    OrbMetaObject {
        id: m.id,
        u: m.u.map(|u| u.to_string()).unwrap_or_default(),
        data_type: m.data_type.clone(),
        ctime: m.ctime,
        flags: m.flags.clone(),
        handle: m.handle,
    }
}

fn proto_to_meta(o: &OrbMetaObject) -> Result<OrbMeta, Status> {
    Ok(OrbMeta {
        id: o.id,
        u: parse_uuid(&o.u)?,
        data_type: if o.data_type.is_empty() {
            "@json".to_string()
        } else {
            o.data_type.clone()
        },
        ctime: o.ctime,
        flags: o.flags.clone(),
        handle: o.handle,
    })
}

#[tonic::async_trait]
impl Orb for OrbService {
    async fn push_data(
        &self,
        request: Request<PushDataRequest>,
    ) -> Result<Response<PushDataReply>, Status> {
        let req = request.into_inner();
        let u = parse_uuid(&req.uuid)?;
        let data = serde_json::from_slice(&req.payload).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&req.payload).into_owned())
        });
        let record = OrbData {
            u,
            subtype: OrbDataSubtype::Json,
            data,
            ..Default::default()
        };
        let saved = self.storage.push_data(record).await?;
        Ok(Response::new(PushDataReply {
            uuid: saved.u.map(|u| u.to_string()).unwrap_or_default(),
        }))
    }

    async fn fetch_data(
        &self,
        request: Request<FetchDataRequest>,
    ) -> Result<Response<FetchDataReply>, Status> {
        let req = request.into_inner();
        let uuid =
            parse_uuid(&req.uuid)?.ok_or_else(|| Status::invalid_argument("missing uuid"))?;
        match self.storage.fetch_data(uuid).await? {
            Some(record) => Ok(Response::new(FetchDataReply {
                found: true,
                payload: serde_json::to_vec(&record.data).unwrap_or_default(),
            })),
            None => Ok(Response::new(FetchDataReply {
                found: false,
                payload: Vec::new(),
            })),
        }
    }

    async fn push_meta(
        &self,
        request: Request<PushMetaRequest>,
    ) -> Result<Response<PushMetaReply>, Status> {
        let req = request.into_inner();
        // The legacy payload has no home in `OrbMeta` (the real blob lives
        // on the `OrbData` row referenced by `handle`); it is accepted for
        // wire compatibility and otherwise ignored.
        let record = OrbMeta {
            id: req.id,
            handle: req.handle,
            ..Default::default()
        };
        let saved = self.storage.push_meta(record).await?;
        Ok(Response::new(PushMetaReply { id: saved.id }))
    }

    async fn fetch_meta(
        &self,
        request: Request<FetchMetaRequest>,
    ) -> Result<Response<FetchMetaReply>, Status> {
        let req = request.into_inner();
        match self.storage.fetch_meta(req.id).await? {
            Some(record) => Ok(Response::new(FetchMetaReply {
                found: true,
                payload: Vec::new(),
                handle: record.handle,
            })),
            None => Ok(Response::new(FetchMetaReply {
                found: false,
                payload: Vec::new(),
                handle: 0,
            })),
        }
    }

    async fn push_orb_data(
        &self,
        request: Request<OrbDataObject>,
    ) -> Result<Response<OrbDataObject>, Status> {
        let record = proto_to_data(&request.into_inner())?;
        let saved = self.storage.push_data(record).await?;
        Ok(Response::new(data_to_proto(&saved)))
    }

    async fn push_orb_meta(
        &self,
        request: Request<OrbMetaObject>,
    ) -> Result<Response<OrbMetaObject>, Status> {
        let record = proto_to_meta(&request.into_inner())?;
        let saved = self.storage.push_meta(record).await?;
        Ok(Response::new(meta_to_proto(&saved)))
    }

    async fn fetch_orb_data(
        &self,
        request: Request<FetchByUuid>,
    ) -> Result<Response<OrbDataObject>, Status> {
        let req = request.into_inner();
        let uuid =
            parse_uuid(&req.uuid)?.ok_or_else(|| Status::invalid_argument("missing uuid"))?;
        let record = self
            .storage
            .fetch_data(uuid)
            .await?
            .ok_or_else(|| Status::not_found("record not found"))?;
        Ok(Response::new(data_to_proto(&record)))
    }

    async fn fetch_orb_meta(
        &self,
        request: Request<FetchById>,
    ) -> Result<Response<OrbMetaObject>, Status> {
        let req = request.into_inner();
        let record = self
            .storage
            .fetch_meta(req.id)
            .await?
            .ok_or_else(|| Status::not_found("record not found"))?;
        Ok(Response::new(meta_to_proto(&record)))
    }
}
