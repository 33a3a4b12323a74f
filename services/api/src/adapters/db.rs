//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Slot claims run inside a transaction that first locks the doctor's row, so two
//! bookings for the same doctor are serialized. The partial unique indexes on
//! `appointments` reject anything that slips past that check.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clinic_core::domain::{
    Address, Appointment, AppointmentFilter, Article, BookingMode, Credentials, Doctor,
    DoctorProfileUpdate, DoctorSnapshot, NewAppointment, NewArticle, NewDoctor, NewUser,
    PatientSnapshot, Principal, ProfileUpdate, QueueOccupancy, User,
};
use clinic_core::ports::{DatabaseService, PortError, PortResult};
use clinic_core::schedule::lowest_free_position;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

const USER_COLUMNS: &str =
    "id, name, email, phone, address_line1, address_line2, gender, dob, image, created_at";

const DOCTOR_COLUMNS: &str = "id, name, email, image, speciality, degree, experience, about, \
     available, fees, address_line1, address_line2, created_at";

const APPOINTMENT_COLUMNS: &str = "id, user_id, doctor_id, patient_name, patient_email, \
     patient_phone, doctor_name, doctor_speciality, doctor_image, slot_date, slot_time, \
     slot_index, amount, booking_mode, queue_position, appointment_type, description, \
     attachment_url, paid, cancelled, completed, rescheduled, booked_at";

const ARTICLE_COLUMNS: &str = "id, title, image_url, source, url, published_at, approved, kind";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    address_line1: String,
    address_line2: String,
    gender: Option<String>,
    dob: Option<NaiveDate>,
    image: Option<String>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            address: Address {
                line1: self.address_line1,
                line2: self.address_line2,
            },
            gender: self.gender,
            dob: self.dob,
            image: self.image,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> Credentials {
        Credentials {
            id: self.id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct DoctorRecord {
    id: Uuid,
    name: String,
    email: String,
    image: String,
    speciality: String,
    degree: String,
    experience: String,
    about: String,
    available: bool,
    fees: i32,
    address_line1: String,
    address_line2: String,
    created_at: DateTime<Utc>,
}
impl DoctorRecord {
    fn to_domain(self) -> Doctor {
        Doctor {
            id: self.id,
            name: self.name,
            email: self.email,
            image: self.image,
            speciality: self.speciality,
            degree: self.degree,
            experience: self.experience,
            about: self.about,
            available: self.available,
            fees: self.fees,
            address: Address {
                line1: self.address_line1,
                line2: self.address_line2,
            },
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct AppointmentRecord {
    id: Uuid,
    user_id: Uuid,
    doctor_id: Uuid,
    patient_name: String,
    patient_email: Option<String>,
    patient_phone: Option<String>,
    doctor_name: String,
    doctor_speciality: String,
    doctor_image: String,
    slot_date: NaiveDate,
    slot_time: NaiveTime,
    slot_index: i32,
    amount: i32,
    booking_mode: String,
    queue_position: i32,
    appointment_type: String,
    description: String,
    attachment_url: Option<String>,
    paid: bool,
    cancelled: bool,
    completed: bool,
    rescheduled: bool,
    booked_at: DateTime<Utc>,
}
impl AppointmentRecord {
    fn to_domain(self) -> PortResult<Appointment> {
        Ok(Appointment {
            id: self.id,
            user_id: self.user_id,
            doctor_id: self.doctor_id,
            patient: PatientSnapshot {
                name: self.patient_name,
                email: self.patient_email,
                phone: self.patient_phone,
            },
            doctor: DoctorSnapshot {
                name: self.doctor_name,
                speciality: self.doctor_speciality,
                image: self.doctor_image,
            },
            slot_date: self.slot_date,
            slot_time: self.slot_time,
            slot_index: self.slot_index as u32,
            amount: self.amount,
            booking_mode: self.booking_mode.parse()?,
            queue_position: self.queue_position as u32,
            appointment_type: self.appointment_type.parse()?,
            description: self.description,
            attachment_url: self.attachment_url,
            paid: self.paid,
            cancelled: self.cancelled,
            completed: self.completed,
            rescheduled: self.rescheduled,
            booked_at: self.booked_at,
        })
    }
}

#[derive(FromRow)]
struct ArticleRecord {
    id: Uuid,
    title: String,
    image_url: Option<String>,
    source: String,
    url: String,
    published_at: DateTime<Utc>,
    approved: bool,
    kind: String,
}
impl ArticleRecord {
    fn to_domain(self) -> Article {
        Article {
            id: self.id,
            title: self.title,
            image_url: self.image_url,
            source: self.source,
            url: self.url,
            published_at: self.published_at,
            approved: self.approved,
            kind: self.kind,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    role: String,
    subject_id: Option<Uuid>,
}

//=========================================================================================
// Error Mapping and Transaction Helpers
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Maps a failed appointment write; the unique indexes report a lost race here.
fn slot_write_error(e: sqlx::Error) -> PortError {
    if is_unique_violation(&e) {
        PortError::Conflict("Slot already booked".to_string())
    } else {
        unexpected(e)
    }
}

fn collect_appointments(records: Vec<AppointmentRecord>) -> PortResult<Vec<Appointment>> {
    records.into_iter().map(|r| r.to_domain()).collect()
}

/// Takes the doctor's row lock for the rest of the transaction.
async fn lock_doctor(tx: &mut Transaction<'_, Postgres>, doctor_id: Uuid) -> PortResult<()> {
    sqlx::query("SELECT id FROM doctors WHERE id = $1 FOR UPDATE")
        .bind(doctor_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Doctor {} not found", doctor_id)))?;
    Ok(())
}

/// Checks the slot and picks the queue position while the doctor row is locked.
/// `exclude` leaves an appointment that is being moved out of the occupancy count.
async fn claim_position(
    tx: &mut Transaction<'_, Postgres>,
    doctor_id: Uuid,
    slot_date: NaiveDate,
    slot_time: NaiveTime,
    mode: BookingMode,
    queue_capacity: u32,
    exclude: Option<Uuid>,
) -> PortResult<u32> {
    let taken: Vec<(i32,)> = sqlx::query_as(
        "SELECT queue_position FROM appointments \
         WHERE doctor_id = $1 AND slot_date = $2 AND slot_time = $3 \
           AND booking_mode = $4 AND NOT cancelled \
           AND ($5::uuid IS NULL OR id <> $5)",
    )
    .bind(doctor_id)
    .bind(slot_date)
    .bind(slot_time)
    .bind(mode.as_str())
    .bind(exclude)
    .fetch_all(&mut **tx)
    .await
    .map_err(unexpected)?;

    match mode {
        BookingMode::Priority if taken.is_empty() => Ok(1),
        BookingMode::Priority => Err(PortError::Conflict("Slot already booked".to_string())),
        BookingMode::Queue => {
            let taken: Vec<u32> = taken.into_iter().map(|(p,)| p as u32).collect();
            lowest_free_position(&taken, queue_capacity)
                .ok_or_else(|| PortError::Conflict("Queue is full for this slot".to_string()))
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Patients ---

    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, name, email, hashed_password, phone, gender, dob) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.phone)
        .bind(&user.gender)
        .bind(user.dob)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict("Email already registered".to_string())
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_credentials(&self, email: &str) -> PortResult<Credentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password FROM users \
             WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("User does not exist".to_string()),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn update_user_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET name = $2, phone = $3, address_line1 = $4, address_line2 = $5, \
             gender = $6, dob = $7, image = COALESCE($8, image) \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(&update.name)
        .bind(&update.phone)
        .bind(&update.address.line1)
        .bind(&update.address.line2)
        .bind(&update.gender)
        .bind(update.dob)
        .bind(&update.image)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn count_users(&self) -> PortResult<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(count as usize)
    }

    // --- Doctors ---

    async fn create_doctor(&self, doctor: NewDoctor) -> PortResult<Doctor> {
        let record = sqlx::query_as::<_, DoctorRecord>(&format!(
            "INSERT INTO doctors (id, name, email, hashed_password, image, speciality, degree, \
             experience, about, fees, address_line1, address_line2) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {}",
            DOCTOR_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&doctor.name)
        .bind(&doctor.email)
        .bind(&doctor.hashed_password)
        .bind(&doctor.image)
        .bind(&doctor.speciality)
        .bind(&doctor.degree)
        .bind(&doctor.experience)
        .bind(&doctor.about)
        .bind(doctor.fees)
        .bind(&doctor.address.line1)
        .bind(&doctor.address.line2)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict("A doctor with this email already exists".to_string())
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> PortResult<Doctor> {
        let record = sqlx::query_as::<_, DoctorRecord>(&format!(
            "SELECT {} FROM doctors WHERE id = $1",
            DOCTOR_COLUMNS
        ))
        .bind(doctor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Doctor {} not found", doctor_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_doctor_credentials(&self, email: &str) -> PortResult<Credentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password FROM doctors WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("Doctor does not exist".to_string()),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn list_doctors(&self) -> PortResult<Vec<Doctor>> {
        let records = sqlx::query_as::<_, DoctorRecord>(&format!(
            "SELECT {} FROM doctors ORDER BY created_at ASC",
            DOCTOR_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn toggle_doctor_availability(&self, doctor_id: Uuid) -> PortResult<Doctor> {
        let record = sqlx::query_as::<_, DoctorRecord>(&format!(
            "UPDATE doctors SET available = NOT available WHERE id = $1 RETURNING {}",
            DOCTOR_COLUMNS
        ))
        .bind(doctor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Doctor {} not found", doctor_id)))?;
        Ok(record.to_domain())
    }

    async fn update_doctor_profile(
        &self,
        doctor_id: Uuid,
        update: DoctorProfileUpdate,
    ) -> PortResult<Doctor> {
        let record = sqlx::query_as::<_, DoctorRecord>(&format!(
            "UPDATE doctors SET fees = $2, address_line1 = $3, address_line2 = $4, available = $5 \
             WHERE id = $1 RETURNING {}",
            DOCTOR_COLUMNS
        ))
        .bind(doctor_id)
        .bind(update.fees)
        .bind(&update.address.line1)
        .bind(&update.address.line2)
        .bind(update.available)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Doctor {} not found", doctor_id)))?;
        Ok(record.to_domain())
    }

    // --- Appointments ---

    async fn reserve_appointment(
        &self,
        appointment: NewAppointment,
        queue_capacity: u32,
    ) -> PortResult<Appointment> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        lock_doctor(&mut tx, appointment.doctor_id).await?;
        let position = claim_position(
            &mut tx,
            appointment.doctor_id,
            appointment.slot_date,
            appointment.slot_time,
            appointment.booking_mode,
            queue_capacity,
            None,
        )
        .await?;

        let record = sqlx::query_as::<_, AppointmentRecord>(&format!(
            "INSERT INTO appointments (id, user_id, doctor_id, patient_name, patient_email, \
             patient_phone, doctor_name, doctor_speciality, doctor_image, slot_date, slot_time, \
             slot_index, amount, booking_mode, queue_position, appointment_type, description, \
             attachment_url, paid) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
             $11, $12, $13, $14, $15, $16, $17, $18, $19) \
             RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(appointment.user_id)
        .bind(appointment.doctor_id)
        .bind(&appointment.patient.name)
        .bind(&appointment.patient.email)
        .bind(&appointment.patient.phone)
        .bind(&appointment.doctor.name)
        .bind(&appointment.doctor.speciality)
        .bind(&appointment.doctor.image)
        .bind(appointment.slot_date)
        .bind(appointment.slot_time)
        .bind(appointment.slot_index as i32)
        .bind(appointment.amount)
        .bind(appointment.booking_mode.as_str())
        .bind(position as i32)
        .bind(appointment.appointment_type.as_str())
        .bind(&appointment.description)
        .bind(&appointment.attachment_url)
        .bind(appointment.paid)
        .fetch_one(&mut *tx)
        .await
        .map_err(slot_write_error)?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        slot_date: NaiveDate,
        slot_time: NaiveTime,
        slot_index: u32,
        queue_capacity: u32,
    ) -> PortResult<Appointment> {
        let current = self.get_appointment(appointment_id).await?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        lock_doctor(&mut tx, current.doctor_id).await?;

        // Re-read under the lock; a concurrent request may have moved it already.
        let locked = sqlx::query_as::<_, AppointmentRecord>(&format!(
            "SELECT {} FROM appointments WHERE id = $1 FOR UPDATE",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?
        .to_domain()?;
        if locked.rescheduled {
            return Err(PortError::Invalid(
                "Appointment already rescheduled once".to_string(),
            ));
        }
        if locked.cancelled {
            return Err(PortError::Invalid(
                "Only upcoming appointments can be rescheduled".to_string(),
            ));
        }

        let position = claim_position(
            &mut tx,
            locked.doctor_id,
            slot_date,
            slot_time,
            locked.booking_mode,
            queue_capacity,
            Some(appointment_id),
        )
        .await?;

        let record = sqlx::query_as::<_, AppointmentRecord>(&format!(
            "UPDATE appointments SET slot_date = $2, slot_time = $3, slot_index = $4, \
             queue_position = $5, rescheduled = TRUE WHERE id = $1 RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .bind(slot_date)
        .bind(slot_time)
        .bind(slot_index as i32)
        .bind(position as i32)
        .fetch_one(&mut *tx)
        .await
        .map_err(slot_write_error)?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> PortResult<Appointment> {
        sqlx::query_as::<_, AppointmentRecord>(&format!(
            "SELECT {} FROM appointments WHERE id = $1",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Appointment {} not found", appointment_id))
            }
            _ => unexpected(e),
        })?
        .to_domain()
    }

    async fn list_appointments(&self, filter: AppointmentFilter) -> PortResult<Vec<Appointment>> {
        let records = sqlx::query_as::<_, AppointmentRecord>(&format!(
            "SELECT {} FROM appointments \
             WHERE ($1::uuid IS NULL OR user_id = $1) AND ($2::uuid IS NULL OR doctor_id = $2) \
             ORDER BY booked_at DESC",
            APPOINTMENT_COLUMNS
        ))
        .bind(filter.user_id)
        .bind(filter.doctor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect_appointments(records)
    }

    async fn cancel_appointment(&self, appointment_id: Uuid) -> PortResult<Appointment> {
        sqlx::query_as::<_, AppointmentRecord>(&format!(
            "UPDATE appointments SET cancelled = TRUE WHERE id = $1 RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Appointment {} not found", appointment_id)))?
        .to_domain()
    }

    async fn complete_appointment(&self, appointment_id: Uuid) -> PortResult<Appointment> {
        sqlx::query_as::<_, AppointmentRecord>(&format!(
            "UPDATE appointments SET completed = TRUE WHERE id = $1 AND NOT cancelled RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| {
            PortError::NotFound(format!("Active appointment {} not found", appointment_id))
        })?
        .to_domain()
    }

    async fn booked_priority_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<(NaiveDate, NaiveTime)>> {
        sqlx::query_as::<_, (NaiveDate, NaiveTime)>(
            "SELECT slot_date, slot_time FROM appointments \
             WHERE doctor_id = $1 AND slot_date BETWEEN $2 AND $3 \
               AND booking_mode = 'priority' AND NOT cancelled \
             ORDER BY slot_date, slot_time",
        )
        .bind(doctor_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn queue_occupancy(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<QueueOccupancy>> {
        let rows: Vec<(NaiveDate, NaiveTime, Vec<i32>)> = sqlx::query_as(
            "SELECT slot_date, slot_time, array_agg(queue_position ORDER BY queue_position) \
             FROM appointments \
             WHERE doctor_id = $1 AND slot_date BETWEEN $2 AND $3 \
               AND booking_mode = 'queue' AND NOT cancelled \
             GROUP BY slot_date, slot_time \
             ORDER BY slot_date, slot_time",
        )
        .bind(doctor_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(rows
            .into_iter()
            .map(|(date, window_start, positions)| QueueOccupancy {
                date,
                window_start,
                taken_positions: positions.into_iter().map(|p| p as u32).collect(),
            })
            .collect())
    }

    // --- Articles ---

    async fn create_article(&self, article: NewArticle) -> PortResult<Article> {
        let record = sqlx::query_as::<_, ArticleRecord>(&format!(
            "INSERT INTO articles (id, title, image_url, source, url) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            ARTICLE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&article.title)
        .bind(&article.image_url)
        .bind(&article.source)
        .bind(&article.url)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_articles(&self, approved_only: bool) -> PortResult<Vec<Article>> {
        let records = sqlx::query_as::<_, ArticleRecord>(&format!(
            "SELECT {} FROM articles WHERE approved OR NOT $1 ORDER BY published_at DESC",
            ARTICLE_COLUMNS
        ))
        .bind(approved_only)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn set_article_approval(&self, article_id: Uuid, approved: bool) -> PortResult<Article> {
        let record = sqlx::query_as::<_, ArticleRecord>(&format!(
            "UPDATE articles SET approved = $2 WHERE id = $1 RETURNING {}",
            ARTICLE_COLUMNS
        ))
        .bind(article_id)
        .bind(approved)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Article {} not found", article_id)))?;
        Ok(record.to_domain())
    }

    // --- Auth Sessions ---

    async fn create_auth_session(
        &self,
        session_id: &str,
        principal: Principal,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO auth_sessions (id, role, subject_id, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(session_id)
        .bind(principal.role())
        .bind(principal.subject_id())
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Principal> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT role, subject_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;
        Principal::from_parts(&record.role, record.subject_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }
}
