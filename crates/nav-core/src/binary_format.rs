//! Binary `.nav` file reader and writer
//!
//! All values are little-endian. The writer emits exactly the fields the reader
//! consumes, so an unmodified mesh round-trips byte for byte.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use glam::Vec3;
use nav_common::{Error, Result};

use crate::area::{
    AttributeFlags, ContextFlags, HidingSpot, NavArea, SpotEncounter, SpotOrder, VisibleArea,
};
use crate::nav_mesh::NavMesh;
use crate::Status;

/// Magic number at the start of every mesh file
pub const NAV_MAGIC: u32 = 0xFEED_FACE;

/// Oldest supported file version
pub const NAV_MIN_VERSION: u32 = 16;

/// Sub-version tag of the supported game variant
pub const NAV_SUB_VERSION: u32 = 2;

/// Upper bound for preallocation from untrusted counts
const MAX_PREALLOC: usize = 1024;

/// Fixed file header
#[derive(Debug, Clone, PartialEq)]
struct NavFileHeader {
    magic: u32,
    version: u32,
    sub_version: u32,
    source_size: u32,
    analyzed: u8,
}

impl NavFileHeader {
    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != NAV_MAGIC {
            return Err(Error::InvalidMesh(Status::WrongMagic.to_string()));
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version < NAV_MIN_VERSION {
            return Err(Error::InvalidMesh(Status::WrongVersion.to_string()));
        }

        let sub_version = reader.read_u32::<LittleEndian>()?;
        if sub_version != NAV_SUB_VERSION {
            return Err(Error::InvalidMesh(Status::WrongSubVersion.to_string()));
        }

        Ok(Self {
            magic,
            version,
            sub_version,
            source_size: reader.read_u32::<LittleEndian>()?,
            analyzed: reader.read_u8()?,
        })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.magic)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.sub_version)?;
        writer.write_u32::<LittleEndian>(self.source_size)?;
        writer.write_u8(self.analyzed)?;
        Ok(())
    }
}

fn read_vec3<R: Read>(reader: &mut R) -> Result<Vec3> {
    Ok(Vec3::new(
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    ))
}

fn write_vec3<W: Write>(writer: &mut W, v: &Vec3) -> Result<()> {
    writer.write_f32::<LittleEndian>(v.x)?;
    writer.write_f32::<LittleEndian>(v.y)?;
    writer.write_f32::<LittleEndian>(v.z)?;
    Ok(())
}

fn read_id_list<R: Read>(reader: &mut R) -> Result<Vec<u32>> {
    let count = reader.read_u32::<LittleEndian>()? as usize;
    let mut ids = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        ids.push(reader.read_u32::<LittleEndian>()?);
    }
    Ok(ids)
}

fn write_id_list<W: Write>(writer: &mut W, ids: &[u32]) -> Result<()> {
    writer.write_u32::<LittleEndian>(len_u32(ids.len())?)?;
    for id in ids {
        writer.write_u32::<LittleEndian>(*id)?;
    }
    Ok(())
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::InvalidMesh(Status::BufferTooSmall.to_string()))
}

fn len_u8(len: usize) -> Result<u8> {
    u8::try_from(len).map_err(|_| Error::InvalidMesh(Status::BufferTooSmall.to_string()))
}

fn read_area<R: Read>(reader: &mut R) -> Result<NavArea> {
    let id = reader.read_u32::<LittleEndian>()?;
    let attributes = AttributeFlags::from_bits(reader.read_u32::<LittleEndian>()?);
    let nw = read_vec3(reader)?;
    let se = read_vec3(reader)?;
    let ne_z = reader.read_f32::<LittleEndian>()?;
    let sw_z = reader.read_f32::<LittleEndian>()?;

    let mut area = NavArea::new(id, nw, se, ne_z, sw_z);
    area.attributes = attributes;

    for dir in 0..4 {
        area.connection_ids[dir] = read_id_list(reader)?;
    }

    let spot_count = reader.read_u8()?;
    for _ in 0..spot_count {
        area.hiding_spots.push(HidingSpot {
            id: reader.read_u32::<LittleEndian>()?,
            pos: read_vec3(reader)?,
            flags: reader.read_u8()?,
        });
    }

    let encounter_count = reader.read_u32::<LittleEndian>()? as usize;
    area.encounters.reserve(encounter_count.min(MAX_PREALLOC));
    for _ in 0..encounter_count {
        let from_id = reader.read_u32::<LittleEndian>()?;
        let from_dir = reader.read_u8()?;
        let to_id = reader.read_u32::<LittleEndian>()?;
        let to_dir = reader.read_u8()?;
        let order_count = reader.read_u8()?;
        let mut spots = Vec::with_capacity(order_count as usize);
        for _ in 0..order_count {
            spots.push(SpotOrder {
                id: reader.read_u32::<LittleEndian>()?,
                t: reader.read_u8()?,
            });
        }
        area.encounters.push(SpotEncounter {
            from_id,
            from_dir,
            to_id,
            to_dir,
            spots,
        });
    }

    area.index_type = reader.read_u16::<LittleEndian>()?;

    for dir in 0..2 {
        area.ladder_ids[dir] = read_id_list(reader)?;
    }

    for value in area.earliest_occupy.iter_mut() {
        *value = reader.read_f32::<LittleEndian>()?;
    }
    for value in area.light_intensity.iter_mut() {
        *value = reader.read_f32::<LittleEndian>()?;
    }

    let visible_count = reader.read_u32::<LittleEndian>()? as usize;
    area.visible_areas.reserve(visible_count.min(MAX_PREALLOC));
    for _ in 0..visible_count {
        area.visible_areas.push(VisibleArea {
            id: reader.read_u32::<LittleEndian>()?,
            attributes: reader.read_u8()?,
        });
    }

    area.inherit_visibility = reader.read_u32::<LittleEndian>()?;
    area.context = ContextFlags::from_bits(reader.read_u32::<LittleEndian>()?);

    Ok(area)
}

fn write_area<W: Write>(writer: &mut W, area: &NavArea) -> Result<()> {
    writer.write_u32::<LittleEndian>(area.id)?;
    writer.write_u32::<LittleEndian>(area.attributes.bits())?;
    write_vec3(writer, &area.nw)?;
    write_vec3(writer, &area.se)?;
    writer.write_f32::<LittleEndian>(area.ne_z)?;
    writer.write_f32::<LittleEndian>(area.sw_z)?;

    for ids in &area.connection_ids {
        write_id_list(writer, ids)?;
    }

    writer.write_u8(len_u8(area.hiding_spots.len())?)?;
    for spot in &area.hiding_spots {
        writer.write_u32::<LittleEndian>(spot.id)?;
        write_vec3(writer, &spot.pos)?;
        writer.write_u8(spot.flags)?;
    }

    writer.write_u32::<LittleEndian>(len_u32(area.encounters.len())?)?;
    for encounter in &area.encounters {
        writer.write_u32::<LittleEndian>(encounter.from_id)?;
        writer.write_u8(encounter.from_dir)?;
        writer.write_u32::<LittleEndian>(encounter.to_id)?;
        writer.write_u8(encounter.to_dir)?;
        writer.write_u8(len_u8(encounter.spots.len())?)?;
        for order in &encounter.spots {
            writer.write_u32::<LittleEndian>(order.id)?;
            writer.write_u8(order.t)?;
        }
    }

    writer.write_u16::<LittleEndian>(area.index_type)?;

    for ids in &area.ladder_ids {
        write_id_list(writer, ids)?;
    }

    for value in &area.earliest_occupy {
        writer.write_f32::<LittleEndian>(*value)?;
    }
    for value in &area.light_intensity {
        writer.write_f32::<LittleEndian>(*value)?;
    }

    writer.write_u32::<LittleEndian>(len_u32(area.visible_areas.len())?)?;
    for visible in &area.visible_areas {
        writer.write_u32::<LittleEndian>(visible.id)?;
        writer.write_u8(visible.attributes)?;
    }

    writer.write_u32::<LittleEndian>(area.inherit_visibility)?;
    writer.write_u32::<LittleEndian>(area.context.bits())?;
    Ok(())
}

/// Reads a navigation mesh from a stream
pub fn read_nav_mesh<R: Read>(reader: &mut R) -> Result<NavMesh> {
    let header = NavFileHeader::read_from(reader)?;

    let place_count = reader.read_u16::<LittleEndian>()?;
    let mut places = Vec::with_capacity(place_count as usize);
    for _ in 0..place_count {
        let len = reader.read_u16::<LittleEndian>()? as usize;
        let mut name = vec![0u8; len];
        reader.read_exact(&mut name)?;
        places.push(name);
    }

    let has_unnamed_areas = reader.read_u8()? != 0;

    let area_count = reader.read_u32::<LittleEndian>()? as usize;
    let mut areas = Vec::with_capacity(area_count.min(MAX_PREALLOC * 16));
    for _ in 0..area_count {
        areas.push(read_area(reader)?);
    }

    let mut mesh = NavMesh::from_areas(header.source_size, areas);
    mesh.version = header.version;
    mesh.sub_version = header.sub_version;
    mesh.analyzed = header.analyzed != 0;
    mesh.places = places;
    mesh.has_unnamed_areas = has_unnamed_areas;
    Ok(mesh)
}

/// Writes a navigation mesh to a stream
pub fn write_nav_mesh<W: Write>(mesh: &NavMesh, writer: &mut W) -> Result<()> {
    let header = NavFileHeader {
        magic: NAV_MAGIC,
        version: mesh.version,
        sub_version: mesh.sub_version,
        source_size: mesh.source_size,
        analyzed: u8::from(mesh.analyzed),
    };
    header.write_to(writer)?;

    let place_count = u16::try_from(mesh.places.len())
        .map_err(|_| Error::InvalidMesh(Status::BufferTooSmall.to_string()))?;
    writer.write_u16::<LittleEndian>(place_count)?;
    for name in &mesh.places {
        let len = u16::try_from(name.len())
            .map_err(|_| Error::InvalidMesh(Status::BufferTooSmall.to_string()))?;
        writer.write_u16::<LittleEndian>(len)?;
        writer.write_all(name)?;
    }

    writer.write_u8(u8::from(mesh.has_unnamed_areas))?;

    writer.write_u32::<LittleEndian>(len_u32(mesh.area_count())?)?;
    for area in mesh.areas() {
        write_area(writer, area)?;
    }
    Ok(())
}

/// Parses a mesh from an in-memory buffer
pub fn nav_mesh_from_bytes(data: &[u8]) -> Result<NavMesh> {
    let mut cursor = Cursor::new(data);
    read_nav_mesh(&mut cursor)
}

/// Serializes a mesh into a byte vector
pub fn nav_mesh_to_bytes(mesh: &NavMesh) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_nav_mesh(mesh, &mut buffer)?;
    Ok(buffer)
}

/// Loads a mesh from disk
pub fn load_nav_mesh_from_file<P: AsRef<Path>>(path: P) -> Result<NavMesh> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    read_nav_mesh(&mut reader)
}

/// Saves a mesh to disk
pub fn save_nav_mesh_to_file<P: AsRef<Path>>(mesh: &NavMesh, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_nav_mesh(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}
